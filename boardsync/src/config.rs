//! Configuration for the sync engine.
//!
//! Layered configuration with the following priority (highest first):
//! 1. TOML config file (`~/.config/boardsync/config.toml`)
//! 2. Compiled defaults
//!
//! A missing config file is not an error (defaults are used). An
//! explicit path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    sync: SyncFileConfig,
    chat: ChatFileConfig,
    presence: PresenceFileConfig,
    errors: ErrorFileConfig,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    recently_updated_ttl_ms: Option<u64>,
    event_buffer: Option<usize>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    page_size: Option<usize>,
    event_buffer: Option<usize>,
}

/// `[presence]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct PresenceFileConfig {
    heartbeat_interval_secs: Option<u64>,
}

/// `[errors]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ErrorFileConfig {
    buffer: Option<usize>,
    ttl_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved engine configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Sync --
    /// How long a task stays marked "recently updated" after a
    /// confirmed or remote update.
    pub recently_updated_ttl: Duration,
    /// Buffer size for push-channel event mpsc channels.
    pub event_buffer: usize,

    // -- Chat --
    /// Number of messages fetched per history page.
    pub chat_page_size: usize,
    /// Buffer size for the `ChatStore` event channel.
    pub chat_event_buffer: usize,

    // -- Presence --
    /// Interval between presence heartbeat writes.
    pub heartbeat_interval: Duration,

    // -- Errors --
    /// Buffer size for the error reporter channel.
    pub error_buffer: usize,
    /// How long a non-retryable error stays queued before auto-dismissal.
    pub error_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            recently_updated_ttl: Duration::from_secs(2),
            event_buffer: 32,
            chat_page_size: 20,
            chat_event_buffer: 64,
            heartbeat_interval: Duration::from_secs(30),
            error_buffer: 16,
            error_ttl: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the default path
    /// (`~/.config/boardsync/config.toml`), falling back to defaults if
    /// the file or the config directory is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a present config file cannot be read
    /// or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(Self::default());
        };
        let path = config_dir.join("boardsync").join("config.toml");
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Self::resolve(&toml::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::ReadFile { path, source: e }),
        }
    }

    /// Load configuration from an explicit path. The file must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::resolve(&toml::from_str(&contents)?))
    }

    /// Resolve a `ClientConfig` from a parsed config file.
    ///
    /// Priority: file > default. Separated from `load()` to enable unit
    /// testing without filesystem access.
    #[must_use]
    fn resolve(file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            recently_updated_ttl: file
                .sync
                .recently_updated_ttl_ms
                .map_or(defaults.recently_updated_ttl, Duration::from_millis),
            event_buffer: file.sync.event_buffer.unwrap_or(defaults.event_buffer),
            chat_page_size: file.chat.page_size.unwrap_or(defaults.chat_page_size),
            chat_event_buffer: file
                .chat
                .event_buffer
                .unwrap_or(defaults.chat_event_buffer),
            heartbeat_interval: file
                .presence
                .heartbeat_interval_secs
                .map_or(defaults.heartbeat_interval, Duration::from_secs),
            error_buffer: file.errors.buffer.unwrap_or(defaults.error_buffer),
            error_ttl: file
                .errors
                .ttl_ms
                .map_or(defaults.error_ttl, Duration::from_millis),
        }
    }
}
