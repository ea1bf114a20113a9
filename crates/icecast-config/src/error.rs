use thiserror::Error;

/// Errors loading or validating an [`crate::Config`].
///
/// Every variant here is fatal only at startup (§7's `ConfigError`
/// taxonomy) — once the server is running, a bad config value can no
/// longer occur because `Config::load` is the only constructor.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file's contents were not valid TOML, or didn't match the
    /// expected shape.
    #[error("failed to parse config file '{path}'")]
    Parse {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },

    /// A value parsed fine but failed a semantic check (range, ordering,
    /// or filesystem precondition).
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
