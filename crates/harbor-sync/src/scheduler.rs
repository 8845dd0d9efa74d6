//! # Scheduler
//!
//! Periodic incremental backups and bidirectional syncs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Scheduler::spawn                              │
//! │                                                                         │
//! │  auto_backup ──► task "backup"   every auto_backup_interval             │
//! │                     └─► BackupManager::create_incremental               │
//! │                                                                         │
//! │  auto_sync ────► task "sync"     every auto_sync_interval               │
//! │                     └─► SyncCoordinator::sync_to_cloud(Bidirectional)   │
//! │                                                                         │
//! │  • First run one interval after start                                   │
//! │  • Missed ticks are delayed, never bursted                              │
//! │  • A failed run is logged; the next tick is the retry                   │
//! │  • SchedulerHandle::shutdown stops both tasks after any running job     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use harbor_core::SyncType;

use crate::backup::{BackupManager, BackupOptions};
use crate::config::BackupConfig;
use crate::coordinator::SyncCoordinator;
use crate::error::{SyncError, SyncResult};

/// Description stamped on scheduled backups.
pub const SCHEDULED_BACKUP_DESCRIPTION: &str = "Scheduled backup";

/// Owns the periodic jobs until spawned.
pub struct Scheduler {
    backups: BackupManager,
    sync: SyncCoordinator,
    config: BackupConfig,
}

/// Handle for stopping spawned scheduler tasks.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl SchedulerHandle {
    /// Names of the running tasks.
    pub fn tasks(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Stops every task and waits for them to exit.
    pub async fn shutdown(self) -> SyncResult<()> {
        // No receivers left means every task already exited.
        let _ = self.shutdown_tx.send(true);

        for (name, task) in self.tasks {
            task.await
                .map_err(|e| SyncError::Internal(format!("{name} task failed: {e}")))?;
        }

        info!("Scheduler stopped");
        Ok(())
    }
}

impl Scheduler {
    pub fn new(backups: BackupManager, sync: SyncCoordinator, config: BackupConfig) -> Self {
        Scheduler {
            backups,
            sync,
            config,
        }
    }

    /// Spawns one task per enabled job.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();
        let started = Instant::now();

        if self.config.auto_backup {
            let backups = self.backups.clone();
            let period = self.config.auto_backup_interval;
            tasks.push((
                "backup",
                tokio::spawn(run_periodic("backup", started + period, period, shutdown_rx.clone(), move || {
                    let backups = backups.clone();
                    async move { scheduled_backup(&backups).await }
                })),
            ));
        }

        if self.config.auto_sync && !self.sync.has_remote() {
            warn!("auto_sync is enabled but no remote is configured; sync task not started");
        } else if self.config.auto_sync {
            let sync = self.sync.clone();
            let period = self.config.auto_sync_interval;
            tasks.push((
                "sync",
                tokio::spawn(run_periodic("sync", started + period, period, shutdown_rx.clone(), move || {
                    let sync = sync.clone();
                    async move { scheduled_sync(&sync).await }
                })),
            ));
        }

        info!(
            tasks = tasks.len(),
            auto_backup = self.config.auto_backup,
            auto_sync = self.config.auto_sync,
            "Scheduler started"
        );

        SchedulerHandle { shutdown_tx, tasks }
    }
}

/// Runs `job` every `period`, first at `first_tick`.
async fn run_periodic<F, Fut>(
    name: &'static str,
    first_tick: Instant,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = time::interval_at(first_tick, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(task = name, period_secs = period.as_secs(), "Periodic task running");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                debug!(task = name, "Tick");
                job().await;
            }
            _ = shutdown.changed() => {
                debug!(task = name, "Shutdown signal received");
                break;
            }
        }
    }
}

async fn scheduled_backup(backups: &BackupManager) {
    match backups
        .create_incremental(BackupOptions::described(SCHEDULED_BACKUP_DESCRIPTION))
        .await
    {
        Ok(record) => debug!(backup_id = %record.id(), "Scheduled backup finished"),
        Err(e) => warn!(error = %e, "Scheduled backup failed, retrying next tick"),
    }
}

async fn scheduled_sync(sync: &SyncCoordinator) {
    match sync.sync_to_cloud(SyncType::Bidirectional).await {
        Ok(record) if record.is_success() => {
            debug!(sync_id = %record.id, "Scheduled sync finished")
        }
        Ok(record) => warn!(
            sync_id = %record.id,
            error = record.error.as_deref().unwrap_or("unknown"),
            "Scheduled sync failed, retrying next tick"
        ),
        Err(SyncError::SyncAlreadyInProgress) => {
            debug!("Sync already running, skipping scheduled sync")
        }
        Err(e) => warn!(error = %e, "Scheduled sync failed, retrying next tick"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryRemote, RemoteBackupService};
    use harbor_core::SyncRunStatus;
    use harbor_store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    struct Fixture {
        data: Arc<MemoryStore>,
        remote: Arc<MemoryRemote>,
        backups: BackupManager,
        sync: SyncCoordinator,
    }

    fn fixture(with_remote: bool) -> Fixture {
        let data = Arc::new(MemoryStore::with_entries([("a", "1")]));
        let meta: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let remote = Arc::new(MemoryRemote::new());
        let remote_service =
            with_remote.then(|| remote.clone() as Arc<dyn RemoteBackupService>);

        Fixture {
            backups: BackupManager::new(data.clone(), meta.clone(), 100),
            sync: SyncCoordinator::new(data.clone(), meta, remote_service, 50),
            data,
            remote,
        }
    }

    fn config(auto_backup: bool, auto_sync: bool) -> BackupConfig {
        BackupConfig {
            auto_backup,
            auto_backup_interval: Duration::from_secs(60),
            auto_sync,
            auto_sync_interval: Duration::from_secs(30),
            ..BackupConfig::default()
        }
    }

    /// Lets spawned tasks run until the runtime is idle.
    async fn settle() {
        time::sleep(Duration::from_millis(1)).await;
    }

    async fn backup_count(fx: &Fixture) -> u64 {
        fx.backups.stats().await.unwrap().total
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_backup_after_one_interval() {
        let fx = fixture(false);
        let handle = Scheduler::new(fx.backups.clone(), fx.sync.clone(), config(true, false)).spawn();
        assert_eq!(handle.tasks(), vec!["backup"]);

        settle().await;
        assert_eq!(backup_count(&fx).await, 0);

        time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(backup_count(&fx).await, 1);

        fx.data.set("b", "2").await.unwrap();
        time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(backup_count(&fx).await, 2);

        let list = fx.backups.list(10, 0).await.unwrap();
        assert_eq!(
            list[0].description.as_deref(),
            Some(SCHEDULED_BACKUP_DESCRIPTION)
        );

        handle.shutdown().await.unwrap();
        time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(backup_count(&fx).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_jobs_do_not_run() {
        let fx = fixture(true);
        let handle = Scheduler::new(fx.backups.clone(), fx.sync.clone(), config(false, false)).spawn();
        assert!(handle.tasks().is_empty());

        time::advance(Duration::from_secs(3600)).await;
        settle().await;

        assert_eq!(backup_count(&fx).await, 0);
        assert!(fx.sync.history(10).await.unwrap().is_empty());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_task_requires_remote() {
        let fx = fixture(false);
        let handle = Scheduler::new(fx.backups.clone(), fx.sync.clone(), config(false, true)).spawn();
        assert!(handle.tasks().is_empty());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_sync_is_bidirectional() {
        let fx = fixture(true);
        fx.remote.upload(&[("r".to_string(), "9".to_string())].into()).await.unwrap();
        let handle = Scheduler::new(fx.backups.clone(), fx.sync.clone(), config(false, true)).spawn();

        time::advance(Duration::from_secs(30)).await;
        settle().await;

        let history = fx.sync.history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sync_type, SyncType::Bidirectional);
        assert_eq!(fx.data.get("r").await.unwrap().as_deref(), Some("9"));
        assert!(fx.remote.data().contains_key("a"));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sync_retried_on_next_tick() {
        let fx = fixture(true);
        fx.remote.set_offline(true);
        let handle = Scheduler::new(fx.backups.clone(), fx.sync.clone(), config(false, true)).spawn();

        time::advance(Duration::from_secs(30)).await;
        settle().await;
        let history = fx.sync.history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, SyncRunStatus::Failed);

        fx.remote.set_offline(false);
        time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fx.sync.history(10).await.unwrap().len(), 1);

        time::advance(Duration::from_secs(20)).await;
        settle().await;
        let history = fx.sync.history(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, SyncRunStatus::Completed);

        handle.shutdown().await.unwrap();
    }
}
