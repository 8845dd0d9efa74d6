//! # harbor-core: Pure Backup & Sync Logic
//!
//! Everything the engine decides without touching storage or the network:
//! record lifecycles, incremental diffs, chain materialization, retention
//! planning, listing and statistics.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Harbor Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Caller (UI layer / daemon)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          harbor-sync (BackupManager, SyncCoordinator)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ harbor-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   diff    │  │ retention │  │  catalog  │  │   │
//! │  │   │  Records  │  │ Increment │  │  Cleanup  │  │ List/Stats│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORE ACCESS • NO NETWORK • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              harbor-store (KeyValueStore, SQLite)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use harbor_core::diff::diff_content;
//! use harbor_core::ContentMap;
//!
//! let base: ContentMap = [("a", "1"), ("b", "2")]
//!     .into_iter()
//!     .map(|(k, v)| (k.to_string(), v.to_string()))
//!     .collect();
//! let current: ContentMap = [("a", "1"), ("b", "3"), ("c", "4")]
//!     .into_iter()
//!     .map(|(k, v)| (k.to_string(), v.to_string()))
//!     .collect();
//!
//! let diff = diff_content(&base, &current);
//! assert_eq!(diff.changed.len(), 2);
//! assert!(diff.deleted.is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod diff;
pub mod error;
pub mod retention;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Prefix of every key the engine writes for its own bookkeeping.
///
/// When data and metadata share one store, snapshots, restores and
/// downloads skip keys under this prefix so metadata never ends up inside a
/// backup. Mutations may never target it.
pub const RESERVED_KEY_PREFIX: &str = "@harbor:";

/// Default cap on the number of retained backups.
pub const DEFAULT_MAX_BACKUPS: usize = 100;

/// Cap on retained sync history entries.
pub const MAX_SYNC_HISTORY: usize = 50;

/// Longest accepted user-data key, in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Largest page a listing call may request.
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Returns true for keys owned by the engine.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_KEY_PREFIX)
}
