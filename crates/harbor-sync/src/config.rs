//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     HARBOR_TERMINAL_ID=register-01                                     │
//! │     HARBOR_SERVER_URL=https://pos.example.com                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/harbor-pos/sync.toml (Linux)                             │
//! │     ~/Library/Application Support/com.harbor.pos/sync.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     batch 500, poll every 30s                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Terminal Identity
//! The terminal id tags every push and pull, so it must survive restarts.
//! When neither the file nor `HARBOR_TERMINAL_ID` provides one, [`SyncConfig::load`]
//! generates a UUID and writes it back to the config file before returning.
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [terminal]
//! id = "register-01"
//! name = "Register 1"
//!
//! [server]
//! base_url = "https://pos.example.com"
//! request_timeout_secs = 30
//!
//! [sync]
//! cursor_name = "server"
//! batch_size = 500
//! poll_interval_secs = 30
//! guard_posted_documents = true
//! initial_backoff_ms = 500
//! max_backoff_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use harbor_core::{DEFAULT_CURSOR_NAME, MAX_BATCH_SIZE};

// =============================================================================
// Terminal Configuration
// =============================================================================

/// Identity of this register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Terminal identifier sent with every push and pull.
    /// Generated and persisted on first load if not provided.
    #[serde(default)]
    pub id: String,

    /// Human-readable name (e.g., "Register 1").
    #[serde(default = "default_terminal_name")]
    pub name: String,
}

fn default_terminal_name() -> String {
    "POS Terminal".to_string()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            id: String::new(),
            name: default_terminal_name(),
        }
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Where the central server lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base address; `api/sync/...` paths are resolved against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout enforced by the HTTP client.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Name of the cursor row tracking this server.
    #[serde(default = "default_cursor_name")]
    pub cursor_name: String,

    /// Changes per push and per pull (1..=500).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between background sync cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Refuse to overwrite or delete posted documents during pull.
    #[serde(default = "default_true")]
    pub guard_posted_documents: bool,

    /// First retry delay after a retryable failure.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Ceiling for the retry delay.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_cursor_name() -> String {
    DEFAULT_CURSOR_NAME.to_string()
}
fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}
fn default_poll_interval() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    300
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            cursor_name: default_cursor_name(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            guard_posted_documents: true,
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub terminal: TerminalConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Creates a config with defaults and a freshly generated terminal ID.
    ///
    /// The id is not persisted; use [`SyncConfig::load`] for a stable one.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.terminal.id = Uuid::new_v4().to_string();
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    ///
    /// A missing terminal id is generated and saved to the config file, so
    /// the next load returns the same id. Fails if it cannot be saved.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    fn load_with(
        config_path: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SyncResult<Self> {
        let path = config_path.or_else(Self::default_config_path);
        let mut config = Self::default();

        if let Some(path) = &path {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        let env_terminal_id = lookup("HARBOR_TERMINAL_ID").is_some();
        if config.terminal.id.trim().is_empty() && !env_terminal_id {
            config.terminal.id = Uuid::new_v4().to_string();
            match path {
                Some(path) => {
                    config.save(Some(path))?;
                    info!(terminal_id = %config.terminal.id, "Generated and saved terminal ID");
                }
                None => return Err(SyncError::MissingTerminalId),
            }
        }

        config.apply_overrides_from(lookup);
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults with a generated id if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load sync config, using defaults");
            Self::new()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.terminal.id.trim().is_empty() {
            return Err(SyncError::MissingTerminalId);
        }

        let url = Url::parse(&self.server.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Server URL must use http:// or https://, got: {}",
                self.server.base_url
            )));
        }

        if self.sync.batch_size == 0 || self.sync.batch_size > MAX_BATCH_SIZE {
            return Err(SyncError::InvalidConfig(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.sync.batch_size
            )));
        }

        if self.sync.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.cursor_name.is_empty() {
            return Err(SyncError::InvalidConfig("cursor_name must not be empty".into()));
        }

        Ok(())
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("HARBOR_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal ID from environment");
            self.terminal.id = id;
        }

        if let Some(name) = lookup("HARBOR_TERMINAL_NAME") {
            self.terminal.name = name;
        }

        if let Some(url) = lookup("HARBOR_SERVER_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.base_url = url;
        }

        if let Some(size) = lookup("HARBOR_SYNC_BATCH_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => self.sync.batch_size = n,
                Err(_) => warn!(value = %size, "Ignoring non-numeric HARBOR_SYNC_BATCH_SIZE"),
            }
        }

        if let Some(secs) = lookup("HARBOR_SYNC_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => self.sync.poll_interval_secs = n,
                Err(_) => warn!(value = %secs, "Ignoring non-numeric HARBOR_SYNC_INTERVAL_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "harbor", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn terminal_id(&self) -> &str {
        &self.terminal.id
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.sync.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.sync.max_backoff_secs)
    }
}
