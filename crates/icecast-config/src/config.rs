use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// The full, validated configuration for `icecastd`, deserialized from a
/// single TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub broadcaster: BroadcasterConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,
    #[serde(default = "defaults::source_port")]
    pub source_port: u16,
    #[serde(default = "defaults::listen_port")]
    pub listen_port: u16,
    pub source_password: String,
    #[serde(default = "defaults::mount_point")]
    pub mount_point: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "defaults::size_mb")]
    pub size_mb: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size_mb: defaults::size_mb(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistConfig {
    #[serde(default = "defaults::playlist_directory")]
    pub directory: String,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default = "defaults::extensions")]
    pub extensions: Vec<String>,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            directory: defaults::playlist_directory(),
            shuffle: false,
            extensions: defaults::extensions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcasterConfig {
    #[serde(default = "defaults::chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "defaults::sleep_high")]
    pub sleep_high: f64,
    #[serde(default = "defaults::sleep_medium")]
    pub sleep_medium: f64,
    #[serde(default = "defaults::sleep_low")]
    pub sleep_low: f64,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            chunk_size: defaults::chunk_size(),
            sleep_high: defaults::sleep_high(),
            sleep_medium: defaults::sleep_medium(),
            sleep_low: defaults::sleep_low(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "defaults::station_name")]
    pub station_name: String,
    #[serde(default)]
    pub station_description: String,
    #[serde(default)]
    pub station_genre: String,
    #[serde(default)]
    pub station_url: String,
    #[serde(default)]
    pub enable_icy: bool,
    #[serde(default = "defaults::icy_metaint")]
    pub icy_metaint: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            station_name: defaults::station_name(),
            station_description: String::new(),
            station_genre: String::new(),
            station_url: String::new(),
            enable_icy: false,
            icy_metaint: defaults::icy_metaint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvancedConfig {
    /// `0` means unlimited.
    #[serde(default)]
    pub max_listeners: usize,
    #[serde(default = "defaults::source_timeout")]
    pub source_timeout: u64,
    #[serde(default)]
    pub verbose_logging: bool,
    #[serde(default = "defaults::enable_stats")]
    pub enable_stats: bool,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            max_listeners: 0,
            source_timeout: defaults::source_timeout(),
            verbose_logging: false,
            enable_stats: defaults::enable_stats(),
        }
    }
}

mod defaults {
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn source_port() -> u16 {
        8001
    }
    pub fn listen_port() -> u16 {
        8000
    }
    pub fn mount_point() -> String {
        "/stream".into()
    }
    pub fn size_mb() -> usize {
        8
    }
    pub fn playlist_directory() -> String {
        "./playlist".into()
    }
    pub fn extensions() -> Vec<String> {
        vec![".mp3".into(), ".ogg".into()]
    }
    pub fn chunk_size() -> usize {
        16 * 1024
    }
    pub fn sleep_high() -> f64 {
        0.0005
    }
    pub fn sleep_medium() -> f64 {
        0.001
    }
    pub fn sleep_low() -> f64 {
        0.002
    }
    pub fn station_name() -> String {
        "Untitled Station".into()
    }
    pub fn icy_metaint() -> usize {
        16_000
    }
    pub fn source_timeout() -> u64 {
        30
    }
    pub fn enable_stats() -> bool {
        true
    }
}

impl Config {
    /// Reads and parses `path`, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file can't be read,
    /// [`ConfigError::Parse`] if it isn't valid TOML matching this shape,
    /// or [`ConfigError::Invalid`] if it fails [`Config::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path_str,
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every range/ordering constraint from §6/§4 of the
    /// specification.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated
    /// constraint found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.buffer.size_mb) {
            return Err(ConfigError::Invalid(format!(
                "buffer.size_mb {} out of range (1..=1000)",
                self.buffer.size_mb
            )));
        }

        if !(1024..=65536).contains(&self.broadcaster.chunk_size) {
            return Err(ConfigError::Invalid(format!(
                "broadcaster.chunk_size {} out of range (1024..=65536)",
                self.broadcaster.chunk_size
            )));
        }

        let b = &self.broadcaster;
        if !(b.sleep_high <= b.sleep_medium && b.sleep_medium <= b.sleep_low) {
            return Err(ConfigError::Invalid(
                "broadcaster sleep tiers must satisfy sleep_high <= sleep_medium <= sleep_low"
                    .into(),
            ));
        }

        if self.server.mount_point.is_empty() || !self.server.mount_point.starts_with('/') {
            return Err(ConfigError::Invalid(
                "server.mount_point must start with '/'".into(),
            ));
        }

        // A playlist directory that already exists but is a regular file
        // (not a directory) can never work; anything else (missing,
        // unreadable) is a non-fatal runtime condition per §4.2.
        let playlist_path = Path::new(&self.playlist.directory);
        if playlist_path.exists() && !playlist_path.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "playlist.directory '{}' exists but is not a directory",
                self.playlist.directory
            )));
        }

        if self.metadata.enable_icy && self.metadata.icy_metaint == 0 {
            return Err(ConfigError::Invalid(
                "metadata.icy_metaint must be nonzero when enable_icy is set".into(),
            ));
        }

        Ok(())
    }
}
