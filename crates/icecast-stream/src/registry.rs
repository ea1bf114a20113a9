use crate::error::StreamError;
use bytes::Bytes;
use icecast_ring::ExportedCounters;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Unique, monotonically increasing identifier for a registered listener.
pub type ListenerId = u64;

struct ListenerSlot {
    id: ListenerId,
    sink: mpsc::Sender<Bytes>,
    active: Arc<AtomicBool>,
}

/// The broadcaster's registry of currently-registered listeners.
///
/// Holds only weak references to each listener (an id and a bounded
/// `mpsc::Sender`), never the listener's own state — the HTTP handler owns
/// that. Dropping a slot here never blocks on a slow client; a full queue
/// is treated as an eviction.
pub struct ListenerRegistry {
    slots: Mutex<Vec<ListenerSlot>>,
    next_id: AtomicU64,
    max_listeners: usize,
    counters: Arc<ExportedCounters>,
}

impl ListenerRegistry {
    /// Creates an empty registry. `max_listeners == 0` means unlimited.
    #[must_use]
    pub fn new(max_listeners: usize, counters: Arc<ExportedCounters>) -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            max_listeners,
            counters,
        }
    }

    /// Registers a new listener sink, returning its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Full`] if `max_listeners` is nonzero and
    /// already reached.
    pub fn register(&self, sink: mpsc::Sender<Bytes>) -> Result<(ListenerId, Arc<AtomicBool>), StreamError> {
        let mut slots = self.slots.lock();
        if self.max_listeners != 0 && slots.len() >= self.max_listeners {
            return Err(StreamError::Full);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        slots.push(ListenerSlot {
            id,
            sink,
            active: Arc::clone(&active),
        });
        drop(slots);

        self.counters.listener_connected();
        Ok((id, active))
    }

    /// Removes a listener by id. Idempotent: unregistering an id that is
    /// no longer present (already evicted, or unregistered twice) has the
    /// same effect as the first call.
    pub fn unregister(&self, id: ListenerId) {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|slot| {
            if slot.id == id {
                slot.active.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
        if slots.len() != before {
            drop(slots);
            self.counters.listener_disconnected();
        }
    }

    /// Returns `true` if `id` is still registered and active.
    #[must_use]
    pub fn is_active(&self, id: ListenerId) -> bool {
        self.slots.lock().iter().any(|slot| slot.id == id)
    }

    /// Returns the number of currently registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns `true` if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempts delivery of one chunk to every registered listener.
    ///
    /// A listener whose queue is full is evicted on the spot, protecting
    /// every other listener from head-of-line blocking. Returns the number
    /// of listeners the chunk was actually delivered to.
    pub fn deliver(&self, chunk: Bytes) -> usize {
        let mut slots = self.slots.lock();
        let mut delivered = 0usize;
        let mut evicted = Vec::new();

        slots.retain(|slot| match slot.sink.try_send(chunk.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                slot.active.store(false, Ordering::Release);
                evicted.push(slot.id);
                false
            }
        });
        let evicted_count = evicted.len();
        drop(slots);

        for _ in 0..evicted_count {
            self.counters.listener_disconnected();
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters() -> Arc<ExportedCounters> {
        Arc::new(ExportedCounters::new())
    }

    #[tokio::test]
    async fn register_then_deliver_reaches_listener() {
        let registry = ListenerRegistry::new(0, counters());
        let (tx, mut rx) = mpsc::channel(4);
        let (id, active) = registry.register(tx).unwrap();

        assert!(registry.is_active(id));
        assert!(active.load(Ordering::Relaxed));

        let delivered = registry.deliver(Bytes::from_static(b"chunk"));
        assert_eq!(delivered, 1);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"chunk"));
    }

    #[tokio::test]
    async fn full_queue_evicts_listener() {
        let registry = ListenerRegistry::new(0, counters());
        let (tx, rx) = mpsc::channel(1);
        let (id, active) = registry.register(tx).unwrap();

        // Fill the queue without draining it.
        registry.deliver(Bytes::from_static(b"first"));
        // Second delivery finds the queue full and evicts.
        registry.deliver(Bytes::from_static(b"second"));

        assert!(!registry.is_active(id));
        assert!(!active.load(Ordering::Relaxed));
        drop(rx);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = ListenerRegistry::new(0, counters());
        let (tx, _rx) = mpsc::channel(4);
        let (id, _active) = registry.register(tx).unwrap();

        registry.unregister(id);
        registry.unregister(id);
        assert!(!registry.is_active(id));
    }

    #[tokio::test]
    async fn max_listeners_rejects_registration_once_full() {
        let registry = ListenerRegistry::new(1, counters());
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        assert!(registry.register(tx1).is_ok());
        assert!(matches!(registry.register(tx2), Err(StreamError::Full)));
    }

    #[tokio::test]
    async fn fast_listener_unaffected_by_slow_listener_eviction() {
        let registry = ListenerRegistry::new(0, counters());
        let (slow_tx, slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(8);

        let (slow_id, _) = registry.register(slow_tx).unwrap();
        let (fast_id, _) = registry.register(fast_tx).unwrap();

        registry.deliver(Bytes::from_static(b"a"));
        registry.deliver(Bytes::from_static(b"b"));

        assert!(!registry.is_active(slow_id));
        assert!(registry.is_active(fast_id));
        assert_eq!(fast_rx.recv().await.unwrap(), Bytes::from_static(b"a"));
        assert_eq!(fast_rx.recv().await.unwrap(), Bytes::from_static(b"b"));
        drop(slow_rx);
    }
}
