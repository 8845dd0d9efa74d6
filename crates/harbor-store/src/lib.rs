//! # harbor-store: Storage Layer for Harbor
//!
//! Everything that reads or writes a key/value store: the store interface
//! itself, its SQLite and in-memory implementations, the content
//! snapshotter, and the repositories that persist engine metadata.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Harbor Data Flow                                 │
//! │                                                                         │
//! │  BackupManager / SyncCoordinator (harbor-sync)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   harbor-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Snapshotter  │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │               │    │               │    │  (embedded)  │  │   │
//! │  │   │ data store    │    │ BackupRepo    │    │ 001_kv.sql   │  │   │
//! │  │   │ → ContentMap  │    │ PendingRepo   │    │              │  │   │
//! │  │   │               │    │ HistoryRepo   │    │              │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │   KeyValueStore    │                               │   │
//! │  │           ▼                    ▼                               │   │
//! │  │   ┌─────────────────┐  ┌─────────────────┐                    │   │
//! │  │   │  data namespace │  │  meta namespace │                    │   │
//! │  │   └─────────────────┘  └─────────────────┘                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`kv`] - The `KeyValueStore` trait and `MemoryStore`
//! - [`sqlite`] - SQLite pool, namespaced `SqliteStore`
//! - [`migrations`] - Embedded database migrations
//! - [`snapshot`] - Reads a store into a content map
//! - [`repository`] - Backup index, pending log and sync history
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harbor_store::{SqliteConfig, SqliteDatabase};
//!
//! let db = SqliteDatabase::new(SqliteConfig::new("harbor.db")).await?;
//! let data = Arc::new(db.data_store());
//! let meta = Arc::new(db.meta_store());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod kv;
pub mod migrations;
pub mod repository;
pub mod snapshot;
pub mod sqlite;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use kv::{is_same_store, KeyValueStore, MemoryStore};
pub use snapshot::{ContentSnapshotter, Snapshot};
pub use sqlite::{SqliteConfig, SqliteDatabase, SqliteStore};

// Repository re-exports for convenience
pub use repository::{BackupRepository, PendingOperationRepository, SyncHistoryRepository};
