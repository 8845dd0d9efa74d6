//! # Backup Repository
//!
//! Persists the backup index and each backup's content.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  @harbor:backup_index      [ summary(bk_1), summary(bk_2), ... ]        │
//! │                                 │               │                       │
//! │  @harbor:backup:bk_1  ◄─────────┘               │                       │
//! │  { content, deletedKeys }                       │                       │
//! │                                                 │                       │
//! │  @harbor:backup:bk_2  ◄─────────────────────────┘                       │
//! │  { content, deletedKeys }                                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Content is written before the summary is appended, so an indexed backup
//! always has content to restore from.

use std::sync::Arc;

use harbor_core::{BackupRecord, BackupSummary, ContentMap, RESERVED_KEY_PREFIX};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{load_json, save_json};
use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

const INDEX_KEY: &str = "@harbor:backup_index";
const SEQUENCE_KEY: &str = "@harbor:backup_sequence";

fn content_key(id: &str) -> String {
    format!("{RESERVED_KEY_PREFIX}backup:{id}")
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredContent {
    content: ContentMap,
    #[serde(default)]
    deleted_keys: Vec<String>,
}

/// Repository for the backup index and backup content.
#[derive(Clone)]
pub struct BackupRepository {
    store: Arc<dyn KeyValueStore>,
    lock: Arc<Mutex<()>>,
}

impl BackupRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        BackupRepository {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns every summary in storage order.
    pub async fn list(&self) -> StoreResult<Vec<BackupSummary>> {
        Ok(load_json(self.store.as_ref(), INDEX_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn find(&self, id: &str) -> StoreResult<Option<BackupSummary>> {
        Ok(self.list().await?.into_iter().find(|s| s.id == id))
    }

    /// Loads a summary together with its content.
    ///
    /// An indexed backup without content is `Corrupted`, never empty.
    pub async fn load(&self, id: &str) -> StoreResult<BackupRecord> {
        let summary = self
            .find(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Backup", id))?;

        let key = content_key(id);
        let stored: Option<StoredContent> = load_json(self.store.as_ref(), &key).await?;
        let stored = stored.ok_or_else(|| StoreError::Corrupted {
            message: format!("backup {id} is indexed but its content is missing"),
            key,
        })?;

        Ok(BackupRecord {
            summary,
            content: stored.content,
            deleted_keys: stored.deleted_keys,
        })
    }

    /// Reserves the next creation sequence number.
    pub async fn next_sequence(&self) -> StoreResult<u64> {
        let _guard = self.lock.lock().await;

        let current: u64 = load_json(self.store.as_ref(), SEQUENCE_KEY)
            .await?
            .unwrap_or(0);
        let next = current + 1;
        save_json(self.store.as_ref(), SEQUENCE_KEY, &next).await?;
        Ok(next)
    }

    /// Persists a record: content first, then the index entry.
    pub async fn insert(&self, record: &BackupRecord) -> StoreResult<()> {
        let stored = StoredContent {
            content: record.content.clone(),
            deleted_keys: record.deleted_keys.clone(),
        };
        save_json(self.store.as_ref(), &content_key(record.id()), &stored).await?;

        let _guard = self.lock.lock().await;
        let mut index = self.list().await?;
        index.retain(|s| s.id != record.summary.id);
        index.push(record.summary.clone());
        save_json(self.store.as_ref(), INDEX_KEY, &index).await?;

        debug!(backup_id = %record.id(), index_len = index.len(), "Backup indexed");
        Ok(())
    }

    /// Replaces an existing summary (used for restore annotations).
    pub async fn update_summary(&self, summary: &BackupSummary) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut index = self.list().await?;

        let slot = index
            .iter_mut()
            .find(|s| s.id == summary.id)
            .ok_or_else(|| StoreError::not_found("Backup", summary.id.as_str()))?;
        *slot = summary.clone();

        save_json(self.store.as_ref(), INDEX_KEY, &index).await
    }

    /// Deletes backups by id. Returns how many were indexed.
    pub async fn delete(&self, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let removed = {
            let _guard = self.lock.lock().await;
            let mut index = self.list().await?;
            let before = index.len();
            index.retain(|s| !ids.contains(&s.id));
            save_json(self.store.as_ref(), INDEX_KEY, &index).await?;
            before - index.len()
        };

        for id in ids {
            if let Err(e) = self.store.remove(&content_key(id)).await {
                warn!(backup_id = %id, error = %e, "Failed to remove backup content");
            }
        }

        Ok(removed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
