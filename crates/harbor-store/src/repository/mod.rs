//! # Metadata Repositories
//!
//! The engine's own state lives in the metadata store as JSON values under
//! reserved keys:
//!
//! | Key                          | Value                          | Owner            |
//! |------------------------------|--------------------------------|------------------|
//! | `@harbor:backup_index`       | `Vec<BackupSummary>`           | BackupManager    |
//! | `@harbor:backup_sequence`    | `u64`                          | BackupManager    |
//! | `@harbor:backup:<id>`        | content + deleted keys         | BackupManager    |
//! | `@harbor:pending_operations` | `Vec<PendingOperation>` (FIFO) | SyncCoordinator  |
//! | `@harbor:sync_history`       | `Vec<SyncRecord>`              | SyncCoordinator  |
//!
//! Each repository serializes its read-modify-write cycles through its own
//! mutex, so concurrent appends to the same list never lose updates.

pub mod backups;
pub mod history;
pub mod pending;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

pub use backups::BackupRepository;
pub use history::SyncHistoryRepository;
pub use pending::PendingOperationRepository;

/// Reads and decodes a JSON value.
pub(crate) async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupted {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Encodes and writes a JSON value.
pub(crate) async fn save_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value).map_err(|e| StoreError::write(key, e))?;
    store.set(key, &raw).await
}
