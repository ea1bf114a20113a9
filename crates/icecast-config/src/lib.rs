//! TOML configuration loading and validation for `icecastd`.

mod config;
mod error;

pub use config::{
    AdvancedConfig, BroadcasterConfig, BufferConfig, Config, MetadataConfig, PlaylistConfig,
    ServerConfig,
};
pub use error::ConfigError;
