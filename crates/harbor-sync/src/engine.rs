//! # Harbor Engine
//!
//! Wires stores, remote and configuration into one explicitly constructed
//! engine. Several engines can live in one process, each over its own
//! stores.
//!
//! ```text
//! HarborEngineBuilder
//!   .config(HarborConfig)        validated, reserved flags warned
//!   .data_store(store)           required
//!   .meta_store(store)           defaults to the data store
//!   .remote(service)             defaults to HttpRemote from sync.remote_url
//!   .build() ──► HarborEngine { BackupManager, SyncCoordinator }
//!                    │
//!                    └── spawn_scheduler() ──► SchedulerHandle
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use harbor_store::{KeyValueStore, SqliteConfig, SqliteDatabase};

use crate::backup::BackupManager;
use crate::config::{BackupConfig, HarborConfig};
use crate::coordinator::SyncCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::transport::{HttpRemote, HttpRemoteConfig, RemoteBackupService};

/// The backup & sync engine.
#[derive(Clone)]
pub struct HarborEngine {
    device_id: String,
    config: BackupConfig,
    backups: BackupManager,
    sync: SyncCoordinator,
}

impl HarborEngine {
    pub fn builder() -> HarborEngineBuilder {
        HarborEngineBuilder::default()
    }

    /// Opens the SQLite database named by `config` and builds an engine on
    /// its `data` and `meta` namespaces.
    pub async fn open(config: HarborConfig) -> SyncResult<(Self, SqliteDatabase)> {
        let path = config.database_path().ok_or_else(|| {
            SyncError::InvalidConfig("No database path and no platform data directory".into())
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = SqliteDatabase::new(SqliteConfig::new(path)).await?;
        let engine = HarborEngine::builder()
            .config(config)
            .data_store(Arc::new(db.data_store()))
            .meta_store(Arc::new(db.meta_store()))
            .build()?;

        Ok((engine, db))
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    /// Starts the periodic backup and sync tasks.
    pub fn spawn_scheduler(&self) -> SchedulerHandle {
        Scheduler::new(self.backups.clone(), self.sync.clone(), self.config.clone()).spawn()
    }
}

/// Builder for [`HarborEngine`].
#[derive(Default)]
pub struct HarborEngineBuilder {
    config: Option<HarborConfig>,
    data: Option<Arc<dyn KeyValueStore>>,
    meta: Option<Arc<dyn KeyValueStore>>,
    remote: Option<Arc<dyn RemoteBackupService>>,
    local_only: bool,
}

impl HarborEngineBuilder {
    pub fn config(mut self, config: HarborConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Store holding user data. Required.
    pub fn data_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.data = Some(store);
        self
    }

    /// Store holding backups, pending operations and sync history.
    pub fn meta_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.meta = Some(store);
        self
    }

    /// Uses `remote` instead of an HTTP remote built from the config.
    pub fn remote(mut self, remote: Arc<dyn RemoteBackupService>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Ignores any configured remote URL.
    pub fn local_only(mut self) -> Self {
        self.local_only = true;
        self
    }

    pub fn build(self) -> SyncResult<HarborEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        config.warn_reserved_flags();

        let data = self
            .data
            .ok_or_else(|| SyncError::InvalidConfig("A data store is required".into()))?;
        let meta = match self.meta {
            Some(meta) => meta,
            None => {
                debug!("No metadata store given, sharing the data store");
                data.clone()
            }
        };

        let remote = match (self.local_only, self.remote, config.remote_url()) {
            (true, _, _) => None,
            (false, Some(remote), _) => Some(remote),
            (false, None, Some(url)) => {
                let http = HttpRemote::new(HttpRemoteConfig {
                    base_url: url.to_string(),
                    device_id: config.device_id().to_string(),
                    request_timeout: config.request_timeout(),
                })?;
                Some(Arc::new(http) as Arc<dyn RemoteBackupService>)
            }
            (false, None, None) => None,
        };

        let backup_config = config.backup_config();
        let backups = BackupManager::new(data.clone(), meta.clone(), backup_config.max_backups);
        let sync = SyncCoordinator::new(data, meta, remote, config.sync.max_history);

        info!(
            device_id = %config.device_id(),
            remote = sync.has_remote(),
            max_backups = backup_config.max_backups,
            "Harbor engine ready"
        );

        Ok(HarborEngine {
            device_id: config.device_id().to_string(),
            config: backup_config,
            backups,
            sync,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupOptions;
    use crate::transport::MemoryRemote;
    use harbor_core::{Mutation, RestoreOptions, SyncType};
    use harbor_store::{KeyValueStore, MemoryStore};

    #[test]
    fn test_build_requires_data_store() {
        let result = HarborEngine::builder().build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = HarborConfig::new();
        config.backup.max_backups = 0;

        let result = HarborEngine::builder()
            .config(config)
            .data_store(Arc::new(MemoryStore::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_remote_from_config() {
        let mut config = HarborConfig::new();
        config.sync.remote_url = Some("https://backup.example.com/api".into());

        let engine = HarborEngine::builder()
            .config(config.clone())
            .data_store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        assert!(engine.sync().has_remote());
        assert_eq!(engine.device_id(), config.device_id());

        let engine = HarborEngine::builder()
            .config(config)
            .data_store(Arc::new(MemoryStore::new()))
            .local_only()
            .build()
            .unwrap();
        assert!(!engine.sync().has_remote());
    }

    #[tokio::test]
    async fn test_shared_store_keeps_metadata_out_of_backups() {
        let store = Arc::new(MemoryStore::with_entries([("a", "1")]));
        let engine = HarborEngine::builder()
            .data_store(store.clone())
            .build()
            .unwrap();

        engine
            .backups()
            .create_full(BackupOptions::default())
            .await
            .unwrap();
        let second = engine
            .backups()
            .create_full(BackupOptions::default())
            .await
            .unwrap();

        assert_eq!(second.content.len(), 1);
        assert!(store.len() > 1);
    }

    #[tokio::test]
    async fn test_full_restore_on_shared_store_keeps_metadata() {
        let store = Arc::new(MemoryStore::with_entries([("a", "1"), ("b", "2")]));
        let engine = HarborEngine::builder()
            .data_store(store.clone())
            .build()
            .unwrap();

        let full = engine
            .backups()
            .create_full(BackupOptions::default())
            .await
            .unwrap();
        store.set("a", "changed").await.unwrap();
        store.set("extra", "x").await.unwrap();

        let report = engine
            .backups()
            .restore(full.id(), RestoreOptions::default())
            .await
            .unwrap();

        assert_eq!(report.restored_items, 2);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("extra").await.unwrap(), None);
        assert!(store.keys().await.unwrap().iter().any(|k| k.starts_with("@harbor:")));

        let restored = engine.backups().get(full.id()).await.unwrap();
        assert_eq!(restored.content, full.content);
        assert!(restored.summary.last_restored_at.is_some());
        assert_eq!(engine.backups().stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_end_to_end_offline_then_sync() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = HarborEngine::builder()
            .data_store(Arc::new(MemoryStore::new()))
            .meta_store(Arc::new(MemoryStore::new()))
            .remote(remote.clone())
            .build()
            .unwrap();

        let full = engine
            .backups()
            .create_full(BackupOptions::default())
            .await
            .unwrap();

        remote.set_offline(true);
        let outcome = engine
            .sync()
            .apply_mutation(Mutation::add("note:1", "hello"))
            .await
            .unwrap();
        assert!(outcome.queued);

        remote.set_offline(false);
        let record = engine
            .sync()
            .sync_to_cloud(SyncType::Bidirectional)
            .await
            .unwrap();
        assert!(record.is_success());
        assert_eq!(record.replayed_operations, 1);
        assert_eq!(remote.data().get("note:1").map(String::as_str), Some("hello"));

        let report = engine
            .backups()
            .restore(full.id(), RestoreOptions::default())
            .await
            .unwrap();
        assert_eq!(report.restored_items, 0);
        assert!(engine.backups().get(full.id()).await.unwrap().content.is_empty());
    }
}
