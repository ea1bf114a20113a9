use crate::broadcaster::Broadcaster;
use crate::registry::ListenerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns one listener's registration with the [`Broadcaster`].
///
/// Dropping this guard unregisters the listener — the handler side of the
/// contract in §3: "destroyed when the handler returns (client close,
/// write error, or eviction by Broadcaster)".
pub struct ListenerGuard {
    id: ListenerId,
    broadcaster: Arc<Broadcaster>,
    active: Arc<AtomicBool>,
}

impl ListenerGuard {
    pub(crate) fn new(id: ListenerId, broadcaster: Arc<Broadcaster>, active: Arc<AtomicBool>) -> Self {
        Self {
            id,
            broadcaster,
            active,
        }
    }

    /// This listener's assigned id.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// `false` once the broadcaster has evicted this listener (its queue
    /// was full on a delivery attempt). The handler should check this
    /// between writes to detect eviction promptly rather than waiting for
    /// the channel to close.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.id);
    }
}
