//! # Engine Configuration
//!
//! Configuration management for the backup & sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     HARBOR_REMOTE_URL=https://backup.example.com                       │
//! │     HARBOR_DEVICE_ID=abc-123                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/harbor/harbor.toml (Linux)                               │
//! │     ~/Library/Application Support/dev.harbor.harbor/harbor.toml        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto backup/sync off, max_backups = 100, generated device id       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # harbor.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Field Tablet 3"
//!
//! [backup]
//! auto_backup = true
//! auto_backup_interval_secs = 3600
//! max_backups = 100
//!
//! [sync]
//! auto_sync = true
//! auto_sync_interval_secs = 900
//! remote_url = "https://backup.example.com"
//! request_timeout_secs = 30
//!
//! [storage]
//! database_path = "/var/lib/harbor/harbor.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use harbor_core::{DEFAULT_MAX_BACKUPS, MAX_SYNC_HISTORY};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Identity of this device, sent with every upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name.
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Harbor Device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Backup Settings
// =============================================================================

/// Backup behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Periodically create incremental backups.
    #[serde(default)]
    pub auto_backup: bool,

    /// Interval between scheduled backups (seconds).
    #[serde(default = "default_backup_interval")]
    pub auto_backup_interval_secs: u64,

    /// Maximum number of retained backups.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Reserved. Has no effect.
    #[serde(default)]
    pub compression: bool,

    /// Reserved. Has no effect.
    #[serde(default)]
    pub encryption: bool,
}

fn default_backup_interval() -> u64 {
    3600
}

fn default_max_backups() -> usize {
    DEFAULT_MAX_BACKUPS
}

impl Default for BackupSettings {
    fn default() -> Self {
        BackupSettings {
            auto_backup: false,
            auto_backup_interval_secs: default_backup_interval(),
            max_backups: default_max_backups(),
            compression: false,
            encryption: false,
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Periodically run a bidirectional sync.
    #[serde(default)]
    pub auto_sync: bool,

    /// Interval between scheduled syncs (seconds).
    #[serde(default = "default_sync_interval")]
    pub auto_sync_interval_secs: u64,

    /// Base URL of the remote backup endpoint.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Per-request timeout for remote calls (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Number of sync runs kept in history.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_sync_interval() -> u64 {
    900
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_history() -> usize {
    MAX_SYNC_HISTORY
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            auto_sync: false,
            auto_sync_interval_secs: default_sync_interval(),
            remote_url: None,
            request_timeout_secs: default_request_timeout(),
            max_history: default_max_history(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Where the SQLite store lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Backup Config (runtime projection)
// =============================================================================

/// The settings the engine consults at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub auto_backup: bool,
    pub auto_backup_interval: Duration,
    pub auto_sync: bool,
    pub auto_sync_interval: Duration,
    pub max_backups: usize,
    pub compression: bool,
    pub encryption: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        HarborConfig::default().backup_config()
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarborConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub backup: BackupSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl HarborConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (harbor.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("device.id must not be empty".into()));
        }

        if self.backup.max_backups == 0 {
            return Err(SyncError::InvalidConfig(
                "max_backups must be greater than 0".into(),
            ));
        }

        if self.backup.auto_backup && self.backup.auto_backup_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "auto_backup_interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.auto_sync && self.sync.auto_sync_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "auto_sync_interval_secs must be greater than 0".into(),
            ));
        }

        if let Some(ref raw) = self.sync.remote_url {
            let parsed = url::Url::parse(raw)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SyncError::InvalidUrl(format!(
                    "Remote URL must start with http:// or https://, got: {}",
                    raw
                )));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("HARBOR_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(url) = std::env::var("HARBOR_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.sync.remote_url = Some(url);
        }

        if let Ok(value) = std::env::var("HARBOR_AUTO_BACKUP") {
            match parse_flag(&value) {
                Some(flag) => self.backup.auto_backup = flag,
                None => warn!(value = %value, "Ignoring invalid HARBOR_AUTO_BACKUP"),
            }
        }

        if let Ok(value) = std::env::var("HARBOR_AUTO_SYNC") {
            match parse_flag(&value) {
                Some(flag) => self.sync.auto_sync = flag,
                None => warn!(value = %value, "Ignoring invalid HARBOR_AUTO_SYNC"),
            }
        }

        if let Ok(value) = std::env::var("HARBOR_MAX_BACKUPS") {
            if let Ok(max) = value.parse::<usize>() {
                debug!(max_backups = max, "Overriding max backups from environment");
                self.backup.max_backups = max;
            }
        }

        if let Ok(path) = std::env::var("HARBOR_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("harbor.toml"))
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("dev", "harbor", "harbor")
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns the remote URL if configured.
    pub fn remote_url(&self) -> Option<&str> {
        self.sync.remote_url.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }

    /// Returns the database path, falling back to the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(|| {
            Self::project_dirs().map(|dirs| dirs.data_dir().join("harbor.db"))
        })
    }

    /// Runtime projection of the backup and sync settings.
    pub fn backup_config(&self) -> BackupConfig {
        BackupConfig {
            auto_backup: self.backup.auto_backup,
            auto_backup_interval: Duration::from_secs(self.backup.auto_backup_interval_secs),
            auto_sync: self.sync.auto_sync,
            auto_sync_interval: Duration::from_secs(self.sync.auto_sync_interval_secs),
            max_backups: self.backup.max_backups,
            compression: self.backup.compression,
            encryption: self.backup.encryption,
        }
    }

    /// Logs a warning for each reserved flag that is switched on.
    pub fn warn_reserved_flags(&self) {
        if self.backup.compression {
            warn!("backup.compression is set but not implemented; backups are stored uncompressed");
        }
        if self.backup.encryption {
            warn!("backup.encryption is set but not implemented; backups are stored unencrypted");
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
