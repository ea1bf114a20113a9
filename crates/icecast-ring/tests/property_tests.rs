//! Property tests for `RingBuffer`'s core invariants: bounded occupancy,
//! write/read round-tripping, and wrap-around correctness.

use icecast_ring::{RingBuffer, RingConfig};
use proptest::prelude::*;

proptest! {
    /// `0 <= available() <= capacity()` holds after any sequence of writes
    /// and reads, regardless of how they interleave with the ring's
    /// capacity.
    #[test]
    fn available_never_exceeds_capacity(
        chunks in prop::collection::vec(1usize..64, 0..50),
        reads in prop::collection::vec(1usize..64, 0..50),
    ) {
        let ring = RingBuffer::new(RingConfig::from_mib(1).unwrap());
        let capacity = ring.capacity();

        for len in chunks {
            let data = vec![0xAAu8; len.min(capacity)];
            ring.write(&data);
            prop_assert!(ring.available() <= capacity);
        }

        for len in reads {
            let _ = ring.try_read(len.min(capacity));
            prop_assert!(ring.available() <= capacity);
        }
    }

    /// A write immediately followed by a read of the same length returns
    /// exactly the written bytes, whenever the ring starts empty and has
    /// room.
    #[test]
    fn round_trip_preserves_bytes(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let ring = RingBuffer::new(RingConfig::from_mib(1).unwrap());
        prop_assume!(data.len() <= ring.capacity());

        prop_assert!(ring.write(&data));
        let out = ring.try_read(data.len()).expect("space was reserved for the full write");
        prop_assert_eq!(out, data);
    }

    /// Rejecting a write because of insufficient space must never mutate
    /// `available()` — a rejected write has no partial effect.
    #[test]
    fn rejected_write_is_a_no_op(
        prefill in 1usize..(8 * 1024),
        overflow in 1usize..(8 * 1024),
    ) {
        let ring = RingBuffer::new(RingConfig::from_mib(1).unwrap());
        let capacity = ring.capacity();
        prop_assume!(prefill <= capacity);

        ring.write(&vec![1u8; prefill]);
        let before = ring.available();

        let too_much = capacity - prefill + overflow;
        if too_much > capacity - prefill {
            prop_assert!(!ring.write(&vec![2u8; too_much]));
            prop_assert_eq!(ring.available(), before);
        }
    }
}
