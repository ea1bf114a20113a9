//! Shutdown coordination shared by the broadcaster and every listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct ShutdownState {
    initiated: AtomicBool,
}

impl ShutdownState {
    fn initiate(&self) {
        self.initiated.store(true, Ordering::Release);
    }

    fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }
}

/// A cloneable signal for triggering graceful shutdown from any task.
///
/// Calling [`ShutdownSignal::shutdown`] is idempotent: only the first call
/// has any effect, matching the shutdown contract of every other
/// listener-facing handle in this crate.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    state: Arc<ShutdownState>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(ShutdownState::default()),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Initiates shutdown and wakes every task waiting on
    /// [`ShutdownSignal::notified`].
    pub fn shutdown(&self) {
        if !self.state.is_initiated() {
            self.state.initiate();
            self.notify.notify_waiters();
        }
    }

    /// Returns `true` once [`ShutdownSignal::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.state.is_initiated()
    }

    /// Resolves once shutdown has been signaled. Safe to call repeatedly
    /// and to race against other operations in a `tokio::select!`.
    pub async fn notified(&self) {
        if self.state.is_initiated() {
            return;
        }
        self.notify.notified().await;
    }
}
