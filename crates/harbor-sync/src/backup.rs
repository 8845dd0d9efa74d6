//! # Backup Manager
//!
//! Creates, restores, lists and prunes backups of the data store.
//!
//! ## Backup Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Backup Creation Flow                             │
//! │                                                                         │
//! │  create_full ─────────┐                                                 │
//! │                       │                                                 │
//! │  create_incremental ──┤  no base / broken chain ──► create_full         │
//! │        │              │                                                 │
//! │        │ base = latest completed full|incremental                       │
//! │        │ baseline = materialize(chain up to base)                       │
//! │        ▼              │                                                 │
//! │  snapshot ──► diff(baseline, snapshot) ──► changed + deleted keys       │
//! │                       │                                                 │
//! │  create_selective ────┤  snapshot of the requested keys only            │
//! │                       ▼                                                 │
//! │              BackupRecord (InProgress)                                  │
//! │                 │                │                                      │
//! │        snapshot ok         enumeration failed                           │
//! │                 ▼                ▼                                      │
//! │            Completed           Failed  (indexed, error returned)        │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │         index + content persisted ──► retention cleanup                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Restore Semantics
//! | Type        | overwrite = true                  | overwrite = false          |
//! |-------------|-----------------------------------|----------------------------|
//! | Full        | clear store, write every entry    | write every entry          |
//! | Incremental | write every entry                 | write only missing keys    |
//! | Selective   | write every entry                 | write only missing keys    |
//!
//! Incremental tombstones are applied only with `overwrite` and
//! `apply_deletions` both set. Per-key failures are collected in the
//! report and never abort the restore.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use harbor_core::catalog::{compute_stats, paginate};
use harbor_core::diff::{diff_content, latest_base, materialize, resolve_chain};
use harbor_core::retention::plan_cleanup;
use harbor_core::validation::{validate_backup_id, validate_limit, validate_selection};
use harbor_core::{
    BackupRecord, BackupStats, BackupSummary, BackupType, CoreError,
    ItemError, RestoreOptions, RestoreReport,
};
use harbor_store::{
    is_same_store, BackupRepository, ContentSnapshotter, KeyValueStore, Snapshot, StoreError,
};

use crate::error::{SyncError, SyncResult};

/// Caller options for backup creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupOptions {
    /// Free-form label stored on the summary.
    pub description: Option<String>,
}

impl BackupOptions {
    pub fn described(description: impl Into<String>) -> Self {
        BackupOptions {
            description: Some(description.into()),
        }
    }
}

/// Formats a backup id. Ids sort by creation time, then sequence.
fn backup_id(created_at: DateTime<Utc>, sequence: u64) -> String {
    format!("bk_{}_{:06}", created_at.format("%Y%m%dT%H%M%S%3f"), sequence)
}

/// Orchestrates backups of the data store.
#[derive(Clone)]
pub struct BackupManager {
    data: Arc<dyn KeyValueStore>,
    snapshotter: ContentSnapshotter,
    repo: BackupRepository,
    max_backups: usize,
}

impl BackupManager {
    /// Creates a manager over `data`, persisting metadata into `meta`.
    pub fn new(
        data: Arc<dyn KeyValueStore>,
        meta: Arc<dyn KeyValueStore>,
        max_backups: usize,
    ) -> Self {
        let shared = is_same_store(&data, &meta);
        BackupManager {
            snapshotter: ContentSnapshotter::new(data.clone()).skip_reserved(shared),
            data,
            repo: BackupRepository::new(meta),
            max_backups: max_backups.max(1),
        }
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Captures every key of the data store.
    ///
    /// Fails only when the store cannot be enumerated; the failed attempt is
    /// still indexed with its reason.
    pub async fn create_full(&self, opts: BackupOptions) -> SyncResult<BackupRecord> {
        let mut record = self.begin(BackupType::Full, &opts).await?;

        let snapshot = match self.snapshotter.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.record_failure(record, e).await),
        };

        self.finish(&mut record, snapshot, Vec::new()).await?;
        Ok(record)
    }

    /// Captures keys changed since the latest full or incremental backup.
    ///
    /// Falls back to a full backup when no base exists or when the base's
    /// chain can no longer be resolved.
    pub async fn create_incremental(&self, opts: BackupOptions) -> SyncResult<BackupRecord> {
        let index = self.repo.list().await?;

        let Some(base) = latest_base(&index) else {
            info!("No base backup, creating full backup instead");
            return self.create_full(opts).await;
        };
        let base_id = base.id.clone();

        let chain = match resolve_chain(&index, &base_id) {
            Ok(chain) => chain,
            Err(CoreError::BrokenChain { backup_id, missing }) => {
                warn!(
                    base_id = %backup_id,
                    missing = %missing,
                    "Backup chain broken, creating full backup instead"
                );
                return self.create_full(opts).await;
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::with_capacity(chain.len());
        for id in &chain {
            match self.repo.load(id).await {
                Ok(record) => records.push(record),
                Err(e @ (StoreError::Corrupted { .. } | StoreError::NotFound { .. })) => {
                    warn!(
                        base_id = %base_id,
                        link = %id,
                        error = %e,
                        "Backup chain unreadable, creating full backup instead"
                    );
                    return self.create_full(opts).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        let baseline = materialize(records.iter());

        let mut record = self.begin(BackupType::Incremental, &opts).await?;
        record.summary.base_backup_id = Some(base_id.clone());

        let snapshot = match self.snapshotter.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.record_failure(record, e).await),
        };

        let mut diff = diff_content(&baseline, &snapshot.content);
        // Unreadable keys are unknown, not deleted.
        diff.deleted
            .retain(|key| !snapshot.skipped.iter().any(|s| &s.key == key));

        debug!(
            base_id = %base_id,
            chain_len = chain.len(),
            changed = diff.changed.len(),
            deleted = diff.deleted.len(),
            "Incremental diff computed"
        );

        let snapshot = Snapshot {
            content: diff.changed,
            skipped: snapshot.skipped,
        };
        self.finish(&mut record, snapshot, diff.deleted).await?;
        Ok(record)
    }

    /// Captures only `keys`. Keys missing from the store are omitted.
    pub async fn create_selective<S: AsRef<str>>(
        &self,
        keys: &[S],
        opts: BackupOptions,
    ) -> SyncResult<BackupRecord> {
        validate_selection(keys)?;

        let selected: Vec<String> = keys
            .iter()
            .map(|k| k.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut record = self.begin(BackupType::Selective, &opts).await?;
        record.summary.selected_keys = Some(selected.clone());

        let snapshot = self.snapshotter.snapshot_keys(&selected).await;
        self.finish(&mut record, snapshot, Vec::new()).await?;
        Ok(record)
    }

    async fn begin(&self, backup_type: BackupType, opts: &BackupOptions) -> SyncResult<BackupRecord> {
        let sequence = self.repo.next_sequence().await?;
        let created_at = Utc::now();

        let mut record =
            BackupRecord::begin(backup_id(created_at, sequence), sequence, backup_type, created_at);
        record.summary.description = opts.description.clone();

        debug!(backup_id = %record.id(), backup_type = %backup_type, "Backup started");
        Ok(record)
    }

    async fn finish(
        &self,
        record: &mut BackupRecord,
        snapshot: Snapshot,
        deleted_keys: Vec<String>,
    ) -> SyncResult<()> {
        for skipped in &snapshot.skipped {
            warn!(
                backup_id = %record.id(),
                key = %skipped.key,
                error = %skipped.message,
                "Key left out of backup"
            );
        }

        record.complete(snapshot.content, deleted_keys, Utc::now())?;
        self.repo.insert(record).await?;

        info!(
            backup_id = %record.id(),
            backup_type = %record.backup_type(),
            items = record.summary.item_count,
            deleted = record.summary.deleted_count,
            size = record.summary.size,
            skipped = snapshot.skipped.len(),
            "Backup completed"
        );

        self.apply_retention().await;
        Ok(())
    }

    /// Marks `record` failed, indexes it and returns the error to surface.
    async fn record_failure(&self, mut record: BackupRecord, cause: StoreError) -> SyncError {
        warn!(backup_id = %record.id(), error = %cause, "Backup failed");

        if let Err(e) = record.fail(cause.to_string(), Utc::now()) {
            return e.into();
        }
        if let Err(e) = self.repo.insert(&record).await {
            warn!(backup_id = %record.id(), error = %e, "Failed to index failed backup");
        }
        SyncError::Store(cause)
    }

    async fn apply_retention(&self) {
        match self.cleanup(self.max_backups).await {
            Ok(0) => {}
            Ok(deleted) => info!(deleted, max_backups = self.max_backups, "Retention applied"),
            Err(e) => warn!(error = %e, "Retention cleanup failed"),
        }
    }

    // =========================================================================
    // Restore
    // =========================================================================

    /// Writes a completed backup back into the data store.
    ///
    /// Rejects unknown or non-completed backups before touching the store.
    pub async fn restore(&self, id: &str, opts: RestoreOptions) -> SyncResult<RestoreReport> {
        validate_backup_id(id)?;

        let summary = self
            .repo
            .find(id)
            .await?
            .ok_or_else(|| SyncError::BackupNotFound(id.to_string()))?;
        if !summary.is_completed() {
            return Err(SyncError::BackupNotCompleted {
                id: id.to_string(),
                status: summary.status,
            });
        }

        let record = self.repo.load(id).await?;
        let mut report = RestoreReport {
            backup_id: id.to_string(),
            ..Default::default()
        };

        info!(
            backup_id = %id,
            backup_type = %record.backup_type(),
            overwrite = opts.overwrite,
            apply_deletions = opts.apply_deletions,
            "Restoring backup"
        );

        let merge_only = record.backup_type() != BackupType::Full && !opts.overwrite;
        if record.backup_type() == BackupType::Full && opts.overwrite {
            self.clear_data(&mut report).await?;
        }

        for (key, value) in &record.content {
            if self.snapshotter.excludes(key) {
                continue;
            }

            if merge_only {
                match self.data.contains(key).await {
                    Ok(true) => {
                        report.skipped_items += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(key = %key, error = %e, "Restore existence check failed");
                        report.errors.push(ItemError::new(key.as_str(), e.to_string()));
                        continue;
                    }
                }
            }

            match self.data.set(key, value).await {
                Ok(()) => report.restored_items += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "Restore write failed");
                    report.errors.push(ItemError::new(key.as_str(), e.to_string()));
                }
            }
        }

        if record.backup_type() == BackupType::Incremental && opts.overwrite && opts.apply_deletions {
            for key in record.deleted_keys.iter().filter(|k| !self.snapshotter.excludes(k)) {
                match self.data.remove(key).await {
                    Ok(()) => report.deleted_items += 1,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Restore deletion failed");
                        report.errors.push(ItemError::new(key.as_str(), e.to_string()));
                    }
                }
            }
        }

        let mut summary = record.summary;
        summary.last_restored_at = Some(Utc::now());
        if let Err(e) = self.repo.update_summary(&summary).await {
            warn!(backup_id = %id, error = %e, "Failed to stamp restore time");
        }

        info!(
            backup_id = %id,
            restored = report.restored_items,
            skipped = report.skipped_items,
            deleted = report.deleted_items,
            errors = report.errors.len(),
            "Restore finished"
        );
        Ok(report)
    }

    /// Removes every user key before a full overwrite restore.
    async fn clear_data(&self, report: &mut RestoreReport) -> SyncResult<()> {
        let keys: Vec<String> = self
            .data
            .keys()
            .await?
            .into_iter()
            .filter(|k| !self.snapshotter.excludes(k))
            .collect();

        if let Err(e) = self.data.remove_all(&keys).await {
            warn!(error = %e, "Bulk clear failed, removing keys one by one");
            for key in &keys {
                if let Err(e) = self.data.remove(key).await {
                    report.errors.push(ItemError::new(key.as_str(), e.to_string()));
                }
            }
        }

        debug!(cleared = keys.len(), "Data store cleared for restore");
        Ok(())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Summaries newest first, paginated.
    pub async fn list(&self, limit: usize, offset: usize) -> SyncResult<Vec<BackupSummary>> {
        validate_limit(limit)?;
        Ok(paginate(&self.repo.list().await?, limit, offset))
    }

    /// Full record, content included.
    pub async fn get(&self, id: &str) -> SyncResult<BackupRecord> {
        validate_backup_id(id)?;
        match self.repo.load(id).await {
            Ok(record) => Ok(record),
            Err(StoreError::NotFound { .. }) => Err(SyncError::BackupNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        validate_backup_id(id)?;

        let removed = self.repo.delete(&[id.to_string()]).await?;
        if removed == 0 {
            return Err(SyncError::BackupNotFound(id.to_string()));
        }

        info!(backup_id = %id, "Backup deleted");
        Ok(())
    }

    pub async fn stats(&self) -> SyncResult<BackupStats> {
        Ok(compute_stats(&self.repo.list().await?))
    }

    /// Keeps the `max_backups` newest backups. Returns how many were deleted.
    pub async fn cleanup(&self, max_backups: usize) -> SyncResult<usize> {
        let index = self.repo.list().await?;
        let evict = plan_cleanup(&index, max_backups);
        if evict.is_empty() {
            return Ok(0);
        }

        debug!(count = evict.len(), ids = ?evict, "Evicting backups");
        Ok(self.repo.delete(&evict).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
