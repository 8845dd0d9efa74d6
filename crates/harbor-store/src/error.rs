//! # Store Error Types
//!
//! Error types for key/value store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error) / lock failure / bad JSON                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds the key and categorization            │
//! │       │                                                                 │
//! │       ├── per-key read/write  → logged, item skipped (never fatal)     │
//! │       │                                                                 │
//! │       └── enumeration / metadata → SyncError → caller                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Key/value store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found in metadata.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Reading a single key failed.
    #[error("Failed to read '{key}': {message}")]
    ReadFailed { key: String, message: String },

    /// Writing or removing a single key failed.
    #[error("Failed to write '{key}': {message}")]
    WriteFailed { key: String, message: String },

    /// Listing the store's keys failed.
    ///
    /// ## When This Occurs
    /// - Underlying database unavailable
    /// - Store closed
    #[error("Failed to enumerate keys: {0}")]
    EnumerationFailed(String),

    /// A metadata value could not be decoded.
    #[error("Corrupted metadata under '{key}': {message}")]
    Corrupted { key: String, message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Internal store error.
    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn read(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        StoreError::ReadFailed {
            key: key.into(),
            message: err.to_string(),
        }
    }

    pub fn write(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        StoreError::WriteFailed {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Returns true for failures scoped to a single key.
    pub fn is_item_error(&self) -> bool {
        matches!(
            self,
            StoreError::ReadFailed { .. } | StoreError::WriteFailed { .. }
        )
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_errors() {
        assert!(StoreError::read("a", "io").is_item_error());
        assert!(StoreError::write("a", "io").is_item_error());
        assert!(!StoreError::EnumerationFailed("closed".into()).is_item_error());
        assert!(!StoreError::not_found("Backup", "bk_1").is_item_error());
    }

    #[test]
    fn test_display_includes_key() {
        let err = StoreError::write("profile", "disk full");
        assert_eq!(err.to_string(), "Failed to write 'profile': disk full");
    }
}
