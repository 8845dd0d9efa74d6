//! # Sync Coordinator
//!
//! Synchronizes the local data store with the remote backup endpoint and
//! routes local mutations through the pending operation log when the
//! remote cannot be reached.
//!
//! ## Sync Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          sync_to_cloud(type)                            │
//! │                                                                         │
//! │  in_progress CAS false → true ── already true ──► SyncAlreadyInProgress │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  1. drain_and_replay(pending log) ──► remote.apply_operation(op)        │
//! │        │   (failures stay queued, the run continues)                    │
//! │        ▼                                                                │
//! │  2. type dispatch                                                       │
//! │        Upload        snapshot ──► POST backup/upload                    │
//! │        Download      GET backup/download ──► write every key locally   │
//! │        Bidirectional Download, then Upload                              │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  3. SyncRecord (Completed | Failed) appended to history                 │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  guard dropped: in_progress = false                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A transport failure during step 2 is not an error of the call: it is
//! reported through a `Failed` record. Errors are returned only for
//! concurrency and configuration problems.
//!
//! ## Local Mutations
//! ```text
//! apply_mutation(op)
//!   │
//!   ├── validate ──► local write ── fails ──► Err(Store)
//!   │
//!   ├── no remote configured ──────────────► local only
//!   ├── pending log not empty ─────────────► queued (keeps FIFO order)
//!   └── remote.apply_operation(op)
//!          ├── Ok  ──► remote_applied
//!          └── Err ──► queued
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use harbor_core::validation::{validate_limit, validate_mutation};
use harbor_core::{
    ItemError, Mutation, OperationKind, PendingOperation, SyncRecord, SyncType,
};
use harbor_store::{is_same_store, ContentSnapshotter, KeyValueStore, SyncHistoryRepository};

use crate::error::{SyncError, SyncResult};
use crate::pending::PendingOperationLog;
use crate::transport::RemoteBackupService;

// =============================================================================
// Reports
// =============================================================================

/// Outcome of a local mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MutationOutcome {
    /// The remote accepted the write.
    pub remote_applied: bool,

    /// The write was queued for replay.
    pub queued: bool,

    /// Id of the queued pending operation.
    pub operation_id: Option<String>,
}

/// Current sync state for external queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncStatusReport {
    pub in_progress: bool,

    pub remote_configured: bool,

    pub pending_operations: u64,

    /// Most recent run, successful or not.
    pub last_sync: Option<SyncRecord>,

    pub last_successful_sync_at: Option<DateTime<Utc>>,
}

// =============================================================================
// In-flight Guard
// =============================================================================

/// Holds the in-progress flag for the lifetime of one sync run.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Sync Coordinator
// =============================================================================

/// Runs sync passes against the remote endpoint.
#[derive(Clone)]
pub struct SyncCoordinator {
    /// User data store.
    data: Arc<dyn KeyValueStore>,

    snapshotter: ContentSnapshotter,

    /// Remote endpoint; `None` runs the engine local-only.
    remote: Option<Arc<dyn RemoteBackupService>>,

    pending: PendingOperationLog,

    history: SyncHistoryRepository,

    /// Shared by every clone.
    in_progress: Arc<AtomicBool>,

    /// Held from the pending-log check until a mutation is either accepted
    /// remotely or queued, and for the whole replay.
    remote_writes: Arc<Mutex<()>>,
}

impl SyncCoordinator {
    pub fn new(
        data: Arc<dyn KeyValueStore>,
        meta: Arc<dyn KeyValueStore>,
        remote: Option<Arc<dyn RemoteBackupService>>,
        max_history: usize,
    ) -> Self {
        let shared = is_same_store(&data, &meta);
        SyncCoordinator {
            snapshotter: ContentSnapshotter::new(data.clone()).skip_reserved(shared),
            data,
            remote,
            pending: PendingOperationLog::new(meta.clone()),
            history: SyncHistoryRepository::with_capacity(meta, max_history),
            in_progress: Arc::new(AtomicBool::new(false)),
            remote_writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn pending_log(&self) -> &PendingOperationLog {
        &self.pending
    }

    // =========================================================================
    // Sync Runs
    // =========================================================================

    /// Runs one sync pass.
    ///
    /// ## Errors
    /// - `SyncAlreadyInProgress` when another pass is running
    /// - `RemoteNotConfigured` when the engine has no remote
    ///
    /// Transport failures produce a `Failed` record instead.
    pub async fn sync_to_cloud(&self, sync_type: SyncType) -> SyncResult<SyncRecord> {
        let remote = self.remote.clone().ok_or(SyncError::RemoteNotConfigured)?;

        let _guard = InFlightGuard::acquire(&self.in_progress).ok_or_else(|| {
            debug!(sync_type = %sync_type, "Sync rejected, another run is active");
            SyncError::SyncAlreadyInProgress
        })?;

        let mut record = SyncRecord::start(Uuid::new_v4().to_string(), sync_type, Utc::now());
        info!(sync_id = %record.id, sync_type = %sync_type, "Sync started");

        self.replay_pending(&remote, &mut record).await;

        let outcome = match sync_type {
            SyncType::Upload => self.upload(remote.as_ref(), &mut record).await,
            SyncType::Download => self.download(remote.as_ref(), &mut record).await,
            SyncType::Bidirectional => {
                match self.download(remote.as_ref(), &mut record).await {
                    Ok(()) => self.upload(remote.as_ref(), &mut record).await,
                    Err(e) => Err(e),
                }
            }
        };

        match outcome {
            Ok(()) => {
                record.finish(Utc::now());
                info!(
                    sync_id = %record.id,
                    uploaded = record.uploaded_items,
                    downloaded = record.downloaded_items,
                    replayed = record.replayed_operations,
                    still_pending = record.failed_operations,
                    item_errors = record.item_errors.len(),
                    "Sync completed"
                );
            }
            Err(e) => {
                error!(sync_id = %record.id, error = %e, retryable = e.is_retryable(), "Sync failed");
                record.fail(e.to_string(), Utc::now());
            }
        }

        if let Err(e) = self.history.append(&record).await {
            warn!(sync_id = %record.id, error = %e, "Failed to persist sync history");
        }

        Ok(record)
    }

    /// Replays queued mutations before the snapshot-based pass.
    async fn replay_pending(&self, remote: &Arc<dyn RemoteBackupService>, record: &mut SyncRecord) {
        let _writes = self.remote_writes.lock().await;
        let replay = self
            .pending
            .drain_and_replay(|op: PendingOperation| {
                let remote = remote.clone();
                async move { remote.apply_operation(&op.mutation).await }
            })
            .await;

        match replay {
            Ok(report) => {
                record.replayed_operations = report.replayed;
                record.failed_operations = report.failed;
            }
            Err(e) => {
                warn!(sync_id = %record.id, error = %e, "Pending operation replay aborted");
                record.failed_operations = self.pending.len().await.unwrap_or(0) as u64;
            }
        }
    }

    async fn upload(&self, remote: &dyn RemoteBackupService, record: &mut SyncRecord) -> SyncResult<()> {
        let snapshot = self.snapshotter.snapshot().await?;
        remote.upload(&snapshot.content).await?;

        record.uploaded_items = snapshot.item_count() as u64;
        debug!(sync_id = %record.id, items = record.uploaded_items, "Upload finished");
        Ok(())
    }

    /// Applies the remote payload locally. Remote values win.
    async fn download(
        &self,
        remote: &dyn RemoteBackupService,
        record: &mut SyncRecord,
    ) -> SyncResult<()> {
        let payload = remote.download().await?;

        for (key, value) in &payload {
            if self.snapshotter.excludes(key) {
                debug!(key = %key, "Skipping reserved key from remote payload");
                continue;
            }
            match self.data.set(key, value).await {
                Ok(()) => record.downloaded_items += 1,
                Err(e) => {
                    warn!(sync_id = %record.id, key = %key, error = %e, "Download write failed");
                    record.item_errors.push(ItemError::new(key.as_str(), e.to_string()));
                }
            }
        }

        debug!(
            sync_id = %record.id,
            received = payload.len(),
            written = record.downloaded_items,
            "Download finished"
        );
        Ok(())
    }

    // =========================================================================
    // Local Mutations
    // =========================================================================

    /// Writes a mutation locally, then forwards it to the remote.
    ///
    /// A remote failure queues the mutation instead of failing the call.
    /// While older mutations are still queued, new ones are queued behind
    /// them so the remote sees every write in order.
    pub async fn apply_mutation(&self, mutation: Mutation) -> SyncResult<MutationOutcome> {
        validate_mutation(&mutation)?;
        self.write_local(&mutation).await?;

        let Some(remote) = &self.remote else {
            return Ok(MutationOutcome {
                remote_applied: false,
                queued: false,
                operation_id: None,
            });
        };

        let _writes = self.remote_writes.lock().await;
        if !self.pending.is_empty().await? {
            debug!(key = %mutation.key, "Older operations queued, queueing behind them");
            return self.queue(mutation).await;
        }

        match remote.apply_operation(&mutation).await {
            Ok(()) => Ok(MutationOutcome {
                remote_applied: true,
                queued: false,
                operation_id: None,
            }),
            Err(e) => {
                warn!(key = %mutation.key, kind = %mutation.kind, error = %e, "Remote write failed, queueing");
                self.queue(mutation).await
            }
        }
    }

    async fn write_local(&self, mutation: &Mutation) -> SyncResult<()> {
        match (mutation.kind, &mutation.value) {
            (OperationKind::Remove, _) => self.data.remove(&mutation.key).await?,
            (_, Some(value)) => self.data.set(&mutation.key, value).await?,
            (kind, None) => {
                return Err(SyncError::Internal(format!(
                    "{kind} on '{}' reached the store without a value",
                    mutation.key
                )))
            }
        }
        Ok(())
    }

    async fn queue(&self, mutation: Mutation) -> SyncResult<MutationOutcome> {
        let op = self.pending.append(mutation).await?;
        Ok(MutationOutcome {
            remote_applied: false,
            queued: true,
            operation_id: Some(op.id),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn status(&self) -> SyncResult<SyncStatusReport> {
        Ok(SyncStatusReport {
            in_progress: self.is_in_progress(),
            remote_configured: self.has_remote(),
            pending_operations: self.pending.len().await? as u64,
            last_sync: self.history.latest().await?,
            last_successful_sync_at: self
                .history
                .latest_success()
                .await?
                .and_then(|r| r.completed_at),
        })
    }

    /// Sync runs, newest first.
    pub async fn history(&self, limit: usize) -> SyncResult<Vec<SyncRecord>> {
        validate_limit(limit)?;
        let mut records = self.history.list().await?;
        records.truncate(limit);
        Ok(records)
    }

    pub async fn pending_operations(&self) -> SyncResult<Vec<PendingOperation>> {
        self.pending.list().await
    }

    /// Drops every queued mutation. Used after a confirmed full resync.
    pub async fn clear_pending(&self) -> SyncResult<usize> {
        self.pending.clear().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryRemote;
    use async_trait::async_trait;
    use harbor_core::{ContentMap, SyncRunStatus};
    use harbor_store::MemoryStore;
    use tokio::sync::Notify;

    struct Fixture {
        data: Arc<MemoryStore>,
        remote: Arc<MemoryRemote>,
        coordinator: SyncCoordinator,
    }

    fn fixture(local: &[(&str, &str)], remote: &[(&str, &str)]) -> Fixture {
        let data = Arc::new(MemoryStore::with_entries(local.iter().copied()));
        let remote = Arc::new(MemoryRemote::with_data(map(remote)));
        let coordinator = SyncCoordinator::new(
            data.clone(),
            Arc::new(MemoryStore::new()),
            Some(remote.clone()),
            10,
        );
        Fixture {
            data,
            remote,
            coordinator,
        }
    }

    fn map(pairs: &[(&str, &str)]) -> ContentMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Remote whose upload blocks until released.
    #[derive(Default)]
    struct GatedRemote {
        inner: MemoryRemote,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RemoteBackupService for GatedRemote {
        async fn upload(&self, data: &ContentMap) -> SyncResult<()> {
            self.started.notify_one();
            self.release.notified().await;
            self.inner.upload(data).await
        }

        async fn download(&self) -> SyncResult<ContentMap> {
            self.inner.download().await
        }

        async fn apply_operation(&self, mutation: &Mutation) -> SyncResult<()> {
            self.inner.apply_operation(mutation).await
        }
    }

    /// Remote whose first operation write stalls until released, then fails.
    #[derive(Default)]
    struct StallingRemote {
        inner: MemoryRemote,
        stalled: AtomicBool,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RemoteBackupService for StallingRemote {
        async fn upload(&self, data: &ContentMap) -> SyncResult<()> {
            self.inner.upload(data).await
        }

        async fn download(&self) -> SyncResult<ContentMap> {
            self.inner.download().await
        }

        async fn apply_operation(&self, mutation: &Mutation) -> SyncResult<()> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                self.started.notify_one();
                self.release.notified().await;
                return Err(SyncError::ConnectionFailed("connection reset".into()));
            }
            self.inner.apply_operation(mutation).await
        }
    }

    #[tokio::test]
    async fn test_upload_pushes_full_store() {
        let fx = fixture(&[("a", "1"), ("b", "2")], &[]);

        let record = fx.coordinator.sync_to_cloud(SyncType::Upload).await.unwrap();

        assert_eq!(record.status, SyncRunStatus::Completed);
        assert_eq!(record.uploaded_items, 2);
        assert_eq!(fx.remote.data(), map(&[("a", "1"), ("b", "2")]));
    }

    #[tokio::test]
    async fn test_download_overwrites_local() {
        let fx = fixture(
            &[("a", "local"), ("b", "2")],
            &[("a", "remote"), ("@harbor:user-note", "kept")],
        );

        let record = fx.coordinator.sync_to_cloud(SyncType::Download).await.unwrap();

        assert_eq!(record.downloaded_items, 2);
        assert_eq!(
            fx.data.entries(),
            map(&[("a", "remote"), ("b", "2"), ("@harbor:user-note", "kept")])
        );
    }

    #[tokio::test]
    async fn test_download_into_shared_store_skips_reserved() {
        let data = Arc::new(MemoryStore::with_entries([("a", "local")]));
        let remote = Arc::new(MemoryRemote::with_data(map(&[
            ("a", "remote"),
            ("@harbor:backup_index", "[]"),
        ])));
        let coordinator = SyncCoordinator::new(data.clone(), data.clone(), Some(remote), 10);

        let record = coordinator.sync_to_cloud(SyncType::Download).await.unwrap();

        assert_eq!(record.downloaded_items, 1);
        assert_eq!(data.get("a").await.unwrap().as_deref(), Some("remote"));
        assert_eq!(data.get("@harbor:backup_index").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_download_collects_item_errors() {
        let fx = fixture(&[], &[("a", "1"), ("b", "2")]);
        fx.data.fail_writes_for("a");

        let record = fx.coordinator.sync_to_cloud(SyncType::Download).await.unwrap();

        assert!(record.is_success());
        assert_eq!(record.downloaded_items, 1);
        assert_eq!(record.item_errors.len(), 1);
        assert_eq!(record.item_errors[0].key, "a");
    }

    #[tokio::test]
    async fn test_bidirectional_downloads_then_uploads() {
        let fx = fixture(&[("a", "local"), ("b", "1")], &[("a", "remote"), ("c", "3")]);

        let record = fx
            .coordinator
            .sync_to_cloud(SyncType::Bidirectional)
            .await
            .unwrap();

        let merged = map(&[("a", "remote"), ("b", "1"), ("c", "3")]);
        assert!(record.is_success());
        assert_eq!(record.downloaded_items, 2);
        assert_eq!(record.uploaded_items, 3);
        assert_eq!(fx.data.entries(), merged);
        assert_eq!(fx.remote.data(), merged);
    }

    #[tokio::test]
    async fn test_transport_failure_is_a_failed_record() {
        let fx = fixture(&[("a", "1")], &[]);
        fx.remote.set_offline(true);

        let record = fx.coordinator.sync_to_cloud(SyncType::Upload).await.unwrap();
        assert_eq!(record.status, SyncRunStatus::Failed);
        assert!(record.error.is_some());

        let status = fx.coordinator.status().await.unwrap();
        assert!(!status.in_progress);
        assert_eq!(status.last_sync.map(|r| r.id), Some(record.id));
        assert!(status.last_successful_sync_at.is_none());
    }

    #[tokio::test]
    async fn test_sync_without_remote() {
        let coordinator = SyncCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            None,
            10,
        );

        let err = coordinator.sync_to_cloud(SyncType::Upload).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteNotConfigured));

        let outcome = coordinator
            .apply_mutation(Mutation::add("a", "1"))
            .await
            .unwrap();
        assert!(!outcome.remote_applied);
        assert!(!outcome.queued);
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_rejected() {
        let remote = Arc::new(GatedRemote::default());
        let coordinator = SyncCoordinator::new(
            Arc::new(MemoryStore::with_entries([("a", "1")])),
            Arc::new(MemoryStore::new()),
            Some(remote.clone()),
            10,
        );

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.sync_to_cloud(SyncType::Upload).await })
        };
        remote.started.notified().await;

        assert!(coordinator.is_in_progress());
        let second = coordinator.sync_to_cloud(SyncType::Bidirectional).await;
        assert!(matches!(second, Err(SyncError::SyncAlreadyInProgress)));

        remote.release.notify_one();
        let record = first.await.unwrap().unwrap();
        assert!(record.is_success());
        assert!(!coordinator.is_in_progress());

        // Rejected call leaves no history entry.
        assert_eq!(coordinator.history(10).await.unwrap().len(), 1);

        remote.release.notify_one();
        assert!(coordinator.sync_to_cloud(SyncType::Upload).await.is_ok());
    }

    #[tokio::test]
    async fn test_mutation_online_goes_straight_to_remote() {
        let fx = fixture(&[], &[]);

        let outcome = fx
            .coordinator
            .apply_mutation(Mutation::add("a", "1"))
            .await
            .unwrap();

        assert!(outcome.remote_applied);
        assert!(!outcome.queued);
        assert_eq!(fx.data.entries(), map(&[("a", "1")]));
        assert_eq!(fx.remote.data(), map(&[("a", "1")]));
    }

    #[tokio::test]
    async fn test_mutation_offline_is_queued_and_replayed() {
        let fx = fixture(&[("b", "old")], &[("b", "old")]);
        fx.remote.set_offline(true);

        let added = fx
            .coordinator
            .apply_mutation(Mutation::add("a", "1"))
            .await
            .unwrap();
        let removed = fx
            .coordinator
            .apply_mutation(Mutation::remove("b"))
            .await
            .unwrap();

        assert!(added.queued && removed.queued);
        assert!(added.operation_id.is_some());
        assert_eq!(fx.data.entries(), map(&[("a", "1")]));
        assert_eq!(fx.coordinator.status().await.unwrap().pending_operations, 2);

        fx.remote.set_offline(false);
        let record = fx.coordinator.sync_to_cloud(SyncType::Upload).await.unwrap();

        assert_eq!(record.replayed_operations, 2);
        assert_eq!(record.failed_operations, 0);
        let applied: Vec<String> = fx.remote.applied().into_iter().map(|m| m.key).collect();
        assert_eq!(applied, vec!["a", "b"]);
        assert!(fx.coordinator.pending_operations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_queues_behind_backlog() {
        let fx = fixture(&[], &[]);
        fx.remote.set_offline(true);
        fx.coordinator
            .apply_mutation(Mutation::add("k", "1"))
            .await
            .unwrap();
        fx.remote.set_offline(false);

        let outcome = fx
            .coordinator
            .apply_mutation(Mutation::update("k", "2"))
            .await
            .unwrap();
        assert!(outcome.queued);
        assert!(fx.remote.applied().is_empty());

        fx.coordinator.sync_to_cloud(SyncType::Upload).await.unwrap();
        assert_eq!(fx.remote.data(), map(&[("k", "2")]));
    }

    #[tokio::test]
    async fn test_mutation_behind_an_in_flight_failure_is_queued() {
        let remote = Arc::new(StallingRemote::default());
        let coordinator = SyncCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Some(remote.clone()),
            10,
        );

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.apply_mutation(Mutation::add("k", "1")).await }
        });
        remote.started.notified().await;

        let second = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.apply_mutation(Mutation::update("k", "2")).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        remote.release.notify_one();

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert!(first.queued);
        assert!(second.queued);
        assert!(remote.inner.applied().is_empty());

        let values: Vec<Option<String>> = coordinator
            .pending_operations()
            .await
            .unwrap()
            .into_iter()
            .map(|op| op.mutation.value)
            .collect();
        assert_eq!(values, vec![Some("1".to_string()), Some("2".to_string())]);

        coordinator.sync_to_cloud(SyncType::Upload).await.unwrap();
        assert_eq!(remote.inner.data(), map(&[("k", "2")]));
    }

    #[tokio::test]
    async fn test_replay_failure_does_not_abort_sync() {
        let fx = fixture(&[], &[]);
        fx.remote.set_offline(true);
        for key in ["a", "b", "c"] {
            fx.coordinator
                .apply_mutation(Mutation::add(key, "v"))
                .await
                .unwrap();
        }
        fx.remote.set_offline(false);
        fx.remote.reject_key("b");

        let record = fx.coordinator.sync_to_cloud(SyncType::Upload).await.unwrap();

        assert!(record.is_success());
        assert_eq!(record.replayed_operations, 2);
        assert_eq!(record.failed_operations, 1);

        let pending = fx.coordinator.pending_operations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key(), "b");
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_invalid_mutation_touches_nothing() {
        let fx = fixture(&[], &[]);

        let missing_value = Mutation {
            kind: OperationKind::Update,
            key: "a".into(),
            value: None,
        };
        assert!(matches!(
            fx.coordinator.apply_mutation(missing_value).await,
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(
            fx.coordinator
                .apply_mutation(Mutation::add("@harbor:sync_history", "[]"))
                .await,
            Err(SyncError::Validation(_))
        ));

        assert!(fx.data.is_empty());
        assert!(fx.remote.applied().is_empty());
    }

    #[tokio::test]
    async fn test_local_write_failure_is_not_queued() {
        let fx = fixture(&[], &[]);
        fx.data.fail_writes_for("a");

        let err = fx
            .coordinator
            .apply_mutation(Mutation::add("a", "1"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(_)));
        assert!(fx.coordinator.pending_operations().await.unwrap().is_empty());
        assert!(fx.remote.applied().is_empty());
    }

    #[tokio::test]
    async fn test_history_newest_first_and_capped() {
        let fx = fixture(&[("a", "1")], &[]);
        let mut ids = Vec::new();
        for _ in 0..12 {
            ids.push(fx.coordinator.sync_to_cloud(SyncType::Upload).await.unwrap().id);
        }

        let history = fx.coordinator.history(100).await.unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].id, ids[11]);

        assert_eq!(fx.coordinator.history(3).await.unwrap().len(), 3);
        assert!(fx.coordinator.history(0).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_pending() {
        let fx = fixture(&[], &[]);
        fx.remote.set_offline(true);
        fx.coordinator
            .apply_mutation(Mutation::remove("x"))
            .await
            .unwrap();

        assert_eq!(fx.coordinator.clear_pending().await.unwrap(), 1);
        assert_eq!(fx.coordinator.status().await.unwrap().pending_operations, 0);
    }
}
