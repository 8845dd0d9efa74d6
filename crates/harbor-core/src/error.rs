//! # Error Types
//!
//! Domain-specific error types for harbor-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  harbor-core errors (this file)                                        │
//! │  ├── CoreError        - Record lifecycle and chain errors              │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  harbor-store errors                                                   │
//! │  └── StoreError       - Key/value store failures                       │
//! │                                                                         │
//! │  harbor-sync errors                                                    │
//! │  └── SyncError        - Engine, transport and configuration errors     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → ApiError → Caller     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::BackupStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised by pure record and chain logic.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record was asked to leave a terminal state.
    #[error("Backup {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: BackupStatus,
        to: BackupStatus,
    },

    /// An incremental chain references a backup that is no longer indexed.
    ///
    /// ## When This Occurs
    /// - Retention evicted the full backup an incremental was built on
    /// - A base backup was deleted manually
    #[error("Backup chain for {backup_id} is broken: base {missing} not found")]
    BrokenChain { backup_id: String, missing: String },

    /// Unknown sync type string.
    #[error("Invalid sync type: '{0}'. Valid options: upload, download, bidirectional")]
    InvalidSyncType(String),

    /// Unknown backup type string.
    #[error("Invalid backup type: '{0}'. Valid options: full, incremental, selective")]
    InvalidBackupType(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Key must not be empty")]
    EmptyKey,

    /// Keys under the reserved prefix belong to the engine's metadata.
    #[error("Key '{0}' is reserved for engine metadata")]
    ReservedKey(String),

    #[error("Key is {len} bytes, maximum is {max}")]
    KeyTooLong { len: usize, max: usize },

    /// Add and update mutations must carry a value.
    #[error("Mutation '{kind}' on '{key}' requires a value")]
    MissingValue { kind: String, key: String },

    #[error("Backup id must not be empty")]
    EmptyBackupId,

    #[error("Page limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: usize, max: usize },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
