use crate::config::RingConfig;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Inner {
    buf: Vec<u8>,
    /// Next byte to write, as an offset into `buf`.
    write: usize,
    /// Next byte to read, as an offset into `buf`.
    read: usize,
    /// Bytes currently populated. Invariant: `write == (read + count) % capacity`.
    count: usize,
}

impl Inner {
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn space(&self) -> usize {
        self.capacity() - self.count
    }
}

/// A fixed-capacity byte ring with single-writer/single-reader discipline.
///
/// All operations serialize through one [`parking_lot::Mutex`]; see the
/// module docs for why this is deliberate rather than lock-free.
pub struct RingBuffer {
    inner: Mutex<Inner>,
    /// Signaled after every successful write and every `clear()`, so a
    /// blocked `read_blocking` caller can re-check without busy-spinning.
    readable: Condvar,
    capacity: usize,
}

impl RingBuffer {
    /// Creates a new, empty ring of the configured capacity.
    #[must_use]
    pub fn new(config: RingConfig) -> Self {
        let capacity = config.capacity_bytes();
        Self {
            inner: Mutex::new(Inner {
                buf: vec![0u8; capacity],
                write: 0,
                read: 0,
                count: 0,
            }),
            readable: Condvar::new(),
            capacity,
        }
    }

    /// Returns the ring's fixed capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `bytes` to the ring if there is room for all of them.
    ///
    /// Never partially writes: either every byte is accepted, or none are.
    /// Returns `true` if the bytes were accepted.
    pub fn write(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        if bytes.len() > self.capacity {
            return false;
        }

        let mut inner = self.inner.lock();
        if inner.space() < bytes.len() {
            return false;
        }

        let cap = inner.capacity();
        let write = inner.write;
        let first_len = (cap - write).min(bytes.len());
        inner.buf[write..write + first_len].copy_from_slice(&bytes[..first_len]);

        let remaining = bytes.len() - first_len;
        if remaining > 0 {
            inner.buf[..remaining].copy_from_slice(&bytes[first_len..]);
        }

        inner.write = (write + bytes.len()) % cap;
        inner.count += bytes.len();
        drop(inner);
        self.readable.notify_all();
        true
    }

    /// Reads exactly `size` bytes without blocking.
    ///
    /// Returns `None` (without advancing any offset) if fewer than `size`
    /// bytes are currently available. A `size` of zero always returns an
    /// empty vector without touching the ring.
    #[must_use]
    pub fn try_read(&self, size: usize) -> Option<Vec<u8>> {
        if size == 0 {
            return Some(Vec::new());
        }

        let mut inner = self.inner.lock();
        if inner.count < size {
            return None;
        }
        Some(Self::drain(&mut inner, size))
    }

    /// Reads exactly `size` bytes, blocking the calling thread until enough
    /// bytes are available or `cancelled` reports `true`.
    ///
    /// `cancelled` is polled at `poll_interval` granularity so a caller can
    /// tear this down promptly on shutdown without a dedicated wakeup
    /// channel.
    #[must_use]
    pub fn read_blocking(
        &self,
        size: usize,
        cancelled: &AtomicBool,
        poll_interval: Duration,
    ) -> Option<Vec<u8>> {
        if size == 0 {
            return Some(Vec::new());
        }

        let mut inner = self.inner.lock();
        loop {
            if inner.count >= size {
                return Some(Self::drain(&mut inner, size));
            }
            if cancelled.load(Ordering::Relaxed) {
                return None;
            }
            self.readable.wait_for(&mut inner, poll_interval);
        }
    }

    fn drain(inner: &mut Inner, size: usize) -> Vec<u8> {
        let cap = inner.capacity();
        let read = inner.read;
        let mut out = Vec::with_capacity(size);

        let first_len = (cap - read).min(size);
        out.extend_from_slice(&inner.buf[read..read + first_len]);

        let remaining = size - first_len;
        if remaining > 0 {
            out.extend_from_slice(&inner.buf[..remaining]);
        }

        inner.read = (read + size) % cap;
        inner.count -= size;
        out
    }

    /// Returns the number of bytes currently populated.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.lock().count
    }

    /// Returns the number of bytes that can still be written before the
    /// ring is full.
    #[must_use]
    pub fn space(&self) -> usize {
        self.inner.lock().space()
    }

    /// Returns `count / capacity`, in `[0.0, 1.0]`.
    #[must_use]
    pub fn fill_percent(&self) -> f64 {
        let inner = self.inner.lock();
        inner.count as f64 / inner.capacity() as f64
    }

    /// Resets the ring to empty. Called by the producer-switching state
    /// machine on every transition so listeners never splice bytes from
    /// the old producer onto bytes from the new one.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.write = 0;
        inner.read = 0;
        inner.count = 0;
        drop(inner);
        self.readable.notify_all();
    }
}

/// A shared handle to a [`RingBuffer`], for the common case of one
/// `Arc<RingBuffer>` passed to the producer task, the broadcaster task, and
/// the producer-switching state machine.
pub type SharedRingBuffer = Arc<RingBuffer>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RingConfig;

    fn small_ring(capacity: usize) -> RingBuffer {
        // capacity must be a multiple of 1 MiB for RingConfig; build directly
        // for the smaller capacities these tests need.
        RingBuffer {
            inner: Mutex::new(Inner {
                buf: vec![0u8; capacity],
                write: 0,
                read: 0,
                count: 0,
            }),
            readable: Condvar::new(),
            capacity,
        }
    }

    #[test]
    fn round_trip_write_then_read() {
        let ring = small_ring(16);
        assert!(ring.write(b"hello"));
        assert_eq!(ring.try_read(5).unwrap(), b"hello");
    }

    #[test]
    fn rejects_write_when_insufficient_space() {
        let ring = small_ring(4);
        assert!(ring.write(b"abcd"));
        assert!(!ring.write(b"e"));
        // Rejected write must not have mutated any state.
        assert_eq!(ring.available(), 4);
    }

    #[test]
    fn zero_size_read_is_a_no_op() {
        let ring = small_ring(8);
        ring.write(b"abc");
        assert_eq!(ring.try_read(0), Some(Vec::new()));
        assert_eq!(ring.available(), 3);
    }

    #[test]
    fn wrap_around_write_splits_into_two_copies() {
        let ring = small_ring(8);
        assert!(ring.write(&[1, 2, 3, 4, 5, 6]));
        assert_eq!(ring.try_read(4).unwrap(), vec![1, 2, 3, 4]);
        // write offset is now 6, read offset is 4, 2 bytes populated.
        // This write straddles the end of the buffer (offset 6 -> wraps at 8).
        assert!(ring.write(&[7, 8, 9, 10]));
        assert_eq!(ring.try_read(6).unwrap(), vec![5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn clear_resets_offsets_and_count() {
        let ring = small_ring(8);
        ring.write(b"abcd");
        ring.clear();
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.space(), 8);
        assert!(ring.write(b"wxyz"));
        assert_eq!(ring.try_read(4).unwrap(), b"wxyz");
    }

    #[test]
    fn fill_percent_reflects_occupancy() {
        let ring = small_ring(10);
        ring.write(&[0u8; 5]);
        assert!((ring.fill_percent() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn read_blocking_wakes_on_write() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(small_ring(8));
        let cancelled = Arc::new(AtomicBool::new(false));

        let reader_ring = Arc::clone(&ring);
        let reader_cancelled = Arc::clone(&cancelled);
        let handle = thread::spawn(move || {
            reader_ring.read_blocking(4, &reader_cancelled, Duration::from_millis(5))
        });

        thread::sleep(Duration::from_millis(20));
        assert!(ring.write(b"data"));

        let result = handle.join().unwrap();
        assert_eq!(result, Some(b"data".to_vec()));
    }

    #[test]
    fn read_blocking_honors_cancellation() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(small_ring(8));
        let cancelled = Arc::new(AtomicBool::new(false));

        let reader_ring = Arc::clone(&ring);
        let reader_cancelled = Arc::clone(&cancelled);
        let handle = thread::spawn(move || {
            reader_ring.read_blocking(4, &reader_cancelled, Duration::from_millis(5))
        });

        thread::sleep(Duration::from_millis(20));
        cancelled.store(true, Ordering::Relaxed);

        assert_eq!(handle.join().unwrap(), None);
    }
}
