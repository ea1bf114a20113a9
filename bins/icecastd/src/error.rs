use thiserror::Error;

/// Errors from the source-ingress side (§4.3, §7's `AuthFailure` /
/// `ProtocolError` / `TransientIO` taxonomy).
///
/// None of these propagate past [`crate::mux::ProducerMux`] — a source
/// session ending, however it ends, is communicated to the mux as a state
/// transition, not as a bubbled-up error.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The `Authorization` header's password didn't match
    /// `server.source_password`.
    #[error("source authentication failed")]
    AuthFailed,

    /// A source was already live when a second one connected.
    #[error("a source is already connected")]
    AlreadyLive,

    /// The request line or headers didn't parse as `SOURCE`/`PUT`.
    #[error("malformed source request: {0}")]
    Protocol(String),

    /// No bytes arrived for `advanced.source_timeout` seconds.
    #[error("source timed out")]
    Timeout,

    /// The underlying socket failed.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),
}
