use thiserror::Error;

/// Errors surfaced by `icecast-stream`.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// A [`crate::StreamConfig`] failed validation.
    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),

    /// The listener's outbound queue was full when the broadcaster
    /// attempted delivery; the listener has been evicted.
    #[error("listener queue is full")]
    Full,

    /// The listener's outbound queue (or the broadcaster itself) has been
    /// closed.
    #[error("listener channel is closed")]
    Closed,

    /// The broadcaster has been shut down.
    #[error("broadcaster has been shut down")]
    ShutDown,
}

impl StreamError {
    /// Returns `true` for errors that only affect the one listener, not the
    /// broadcaster as a whole.
    #[must_use]
    pub fn is_listener_local(&self) -> bool {
        matches!(self, Self::Full | Self::Closed)
    }
}
