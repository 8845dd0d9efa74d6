//! # Sync Error Types
//!
//! Error types for the backup & sync engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Concurrency         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  SyncAlreadyInProgress  │ │
//! │  │  InvalidUrl     │  │  Remote(status) │  │                         │ │
//! │  │  NotFound       │  │  Timeout        │  │                         │ │
//! │  │  NotCompleted   │  │  InvalidPayload │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Storage      │  │     Domain      │                              │
//! │  │                 │  │                 │                              │
//! │  │  Store(..)      │  │  Core(..)       │                              │
//! │  │  (enumeration,  │  │  (chain, state  │                              │
//! │  │   metadata)     │  │   transitions)  │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-key store failures never become a `SyncError`; they are collected
//! into item error lists by the operation that hit them.

use harbor_core::{BackupStatus, CoreError, ValidationError};
use harbor_store::StoreError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid remote URL.
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// The requested backup is not in the index.
    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    /// The requested backup exists but cannot be restored.
    #[error("Backup {id} is {status}, only completed backups can be restored")]
    BackupNotCompleted { id: String, status: BackupStatus },

    /// Caller input rejected before touching storage.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The remote endpoint could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The remote endpoint answered with a non-success status.
    #[error("Remote returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// The remote call exceeded its timeout.
    #[error("Remote request timed out: {0}")]
    Timeout(String),

    /// The remote payload could not be decoded.
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),

    /// No remote endpoint configured.
    #[error("No remote endpoint configured")]
    RemoteNotConfigured,

    // =========================================================================
    // Concurrency Errors
    // =========================================================================
    /// A sync run is already active.
    #[error("A sync is already in progress")]
    SyncAlreadyInProgress,

    // =========================================================================
    // Storage & Domain Errors
    // =========================================================================
    /// Store enumeration or metadata persistence failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Record lifecycle or chain error.
    #[error(transparent)]
    Core(CoreError),

    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => SyncError::Validation(e),
            CoreError::InvalidSyncType(s) => {
                SyncError::InvalidConfig(CoreError::InvalidSyncType(s).to_string())
            }
            CoreError::InvalidBackupType(s) => {
                SyncError::InvalidConfig(CoreError::InvalidBackupType(s).to_string())
            }
            other => SyncError::Core(other),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::InvalidPayload(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::Remote {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true for remote transport failures.
    ///
    /// These are the failures that queue a mutation for replay and that the
    /// scheduler simply retries on its next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Remote { .. }
                | SyncError::Timeout(_)
                | SyncError::InvalidPayload(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::BackupNotFound(_)
                | SyncError::BackupNotCompleted { .. }
                | SyncError::Validation(_)
                | SyncError::RemoteNotConfigured
        )
    }

    /// Returns true if a concurrent run caused this error.
    pub fn is_concurrency_error(&self) -> bool {
        matches!(self, SyncError::SyncAlreadyInProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("refused".into()).is_retryable());
        assert!(SyncError::Timeout("30s".into()).is_retryable());
        assert!(SyncError::Remote {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());

        assert!(!SyncError::BackupNotFound("bk_1".into()).is_retryable());
        assert!(!SyncError::SyncAlreadyInProgress.is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert!(SyncError::BackupNotFound("bk_1".into()).is_config_error());
        assert!(SyncError::RemoteNotConfigured.is_config_error());
        assert!(SyncError::SyncAlreadyInProgress.is_concurrency_error());
        assert!(!SyncError::ConnectionFailed("x".into()).is_config_error());
    }

    #[test]
    fn test_core_validation_is_unwrapped() {
        let err: SyncError = CoreError::Validation(ValidationError::EmptyKey).into();
        assert!(matches!(err, SyncError::Validation(ValidationError::EmptyKey)));

        let err: SyncError = CoreError::InvalidSyncType("sideways".into()).into();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("sideways"));
    }
}
