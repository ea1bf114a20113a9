use thiserror::Error;

/// Errors that can occur constructing or operating a [`crate::RingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// A requested ring size fell outside the configured valid range.
    #[error("ring size {size_mb} MiB out of range ({min}..={max} MiB)")]
    InvalidCapacity {
        /// The rejected size, in mebibytes.
        size_mb: usize,
        /// Minimum accepted size, in mebibytes.
        min: usize,
        /// Maximum accepted size, in mebibytes.
        max: usize,
    },
}
