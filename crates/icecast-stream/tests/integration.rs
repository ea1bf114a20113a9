//! Integration tests driving a real `Broadcaster` task against many
//! concurrent listeners.

use bytes::Bytes;
use icecast_ring::{ExportedCounters, RingBuffer, RingConfig};
use icecast_stream::{Broadcaster, StreamConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn fast_config() -> StreamConfig {
    StreamConfig {
        chunk_size: 1024,
        queue_capacity: 64,
        sleep_high: Duration::from_micros(100),
        sleep_medium: Duration::from_micros(250),
        sleep_low: Duration::from_micros(500),
        sleep_empty: Duration::from_millis(2),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn every_registered_listener_receives_the_same_bytes_in_order() {
    const N_LISTENERS: usize = 50;
    const N_CHUNKS: usize = 20;

    let ring = Arc::new(RingBuffer::new(RingConfig::from_mib(1).unwrap()));
    let counters = Arc::new(ExportedCounters::new());
    let broadcaster = Arc::new(
        Broadcaster::new(Arc::clone(&ring), 0, fast_config(), counters).unwrap(),
    );
    let handle = Arc::clone(&broadcaster).spawn();

    let mut receivers = Vec::with_capacity(N_LISTENERS);
    for _ in 0..N_LISTENERS {
        let (tx, rx) = mpsc::channel(N_CHUNKS + 8);
        broadcaster.register(tx).unwrap();
        receivers.push(rx);
    }

    let chunks: Vec<Vec<u8>> = (0..N_CHUNKS as u8)
        .map(|i| vec![i; 1024])
        .collect();
    for chunk in &chunks {
        while !ring.write(chunk) {
            tokio::time::sleep(Duration::from_micros(100)).await;
        }
    }

    for mut rx in receivers {
        for expected in &chunks {
            let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("listener should receive every chunk")
                .expect("channel should stay open");
            assert_eq!(got, Bytes::from(expected.clone()));
        }
    }

    broadcaster.shutdown_signal().shutdown();
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn listener_count_returns_to_zero_after_guard_drops() {
    let ring = Arc::new(RingBuffer::new(RingConfig::from_mib(1).unwrap()));
    let counters = Arc::new(ExportedCounters::new());
    let broadcaster = Arc::new(
        Broadcaster::new(Arc::clone(&ring), 0, fast_config(), counters).unwrap(),
    );

    {
        let (guard, _stream) = broadcaster.register_stream(None).unwrap();
        assert!(guard.is_active());
        assert_eq!(broadcaster.registry().len(), 1);
    }
    assert_eq!(broadcaster.registry().len(), 0);
}
