//! # harbor-sync: Backup & Sync Engine for Harbor
//!
//! Offline-first backup and synchronization of a local key/value store.
//! Backups are taken locally and kept under a retention cap; the store is
//! synchronized with a remote backup endpoint whenever it is reachable, and
//! writes made while offline are queued and replayed in order.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Harbor Engine                                  │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 HarborEngine (engine.rs)                         │  │
//! │  │  Built from HarborConfig + injected stores and remote            │  │
//! │  └───────────────┬──────────────────────────────┬───────────────────┘  │
//! │                  │                              │                       │
//! │                  ▼                              ▼                       │
//! │  ┌────────────────────────────┐  ┌────────────────────────────────┐    │
//! │  │ BackupManager (backup.rs)  │  │ SyncCoordinator (coordinator)  │    │
//! │  │                            │  │                                │    │
//! │  │ full / incremental /       │  │ upload / download / both       │    │
//! │  │ selective, restore,        │  │ apply_mutation, status,        │    │
//! │  │ list, stats, retention     │  │ history                        │    │
//! │  └─────────────┬──────────────┘  └───────┬──────────────┬─────────┘    │
//! │                │                         │              │               │
//! │                │              ┌──────────▼─────┐  ┌─────▼───────────┐   │
//! │                │              │ PendingOp Log  │  │ Transport       │   │
//! │                │              │ (pending.rs)   │  │ HttpRemote      │   │
//! │                │              │ FIFO replay    │  │ (reqwest)       │   │
//! │                │              └────────────────┘  └─────────────────┘   │
//! │                ▼                                                        │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ harbor-store: KeyValueStore (data, meta), snapshotter, repos     │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Scheduler (scheduler.rs): periodic incremental backup and             │
//! │  bidirectional sync, each behind its config flag                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`api`] - Response envelopes and typed errors for a UI layer
//! - [`backup`] - `BackupManager`
//! - [`config`] - TOML + environment configuration
//! - [`coordinator`] - `SyncCoordinator`
//! - [`engine`] - `HarborEngine` and its builder
//! - [`error`] - Engine error types
//! - [`pending`] - Durable pending operation log
//! - [`protocol`] - Remote endpoint wire types
//! - [`scheduler`] - Periodic backup and sync tasks
//! - [`transport`] - `RemoteBackupService`, HTTP and in-memory remotes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harbor_sync::{HarborConfig, HarborEngine};
//! use harbor_core::SyncType;
//!
//! let config = HarborConfig::load_or_default(None);
//! let (engine, _db) = HarborEngine::open(config).await?;
//!
//! let backup = engine.backups().create_incremental(Default::default()).await?;
//! let record = engine.sync().sync_to_cloud(SyncType::Bidirectional).await?;
//!
//! let scheduler = engine.spawn_scheduler();
//! // ...
//! scheduler.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod backup;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod scheduler;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{ApiError, ApiResponse, ErrorCode};
pub use backup::{BackupManager, BackupOptions};
pub use config::{BackupConfig, HarborConfig};
pub use coordinator::{MutationOutcome, SyncCoordinator, SyncStatusReport};
pub use engine::{HarborEngine, HarborEngineBuilder};
pub use error::{SyncError, SyncResult};
pub use pending::{PendingOperationLog, ReplayReport};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use transport::{HttpRemote, HttpRemoteConfig, MemoryRemote, RemoteBackupService};
