//! Sync history repository.

use std::sync::Arc;

use harbor_core::{SyncRecord, MAX_SYNC_HISTORY};
use tokio::sync::Mutex;

use super::{load_json, save_json};
use crate::error::StoreResult;
use crate::kv::KeyValueStore;

const HISTORY_KEY: &str = "@harbor:sync_history";

/// Bounded log of sync runs, stored oldest first.
#[derive(Clone)]
pub struct SyncHistoryRepository {
    store: Arc<dyn KeyValueStore>,
    lock: Arc<Mutex<()>>,
    capacity: usize,
}

impl SyncHistoryRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, MAX_SYNC_HISTORY)
    }

    pub fn with_capacity(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        SyncHistoryRepository {
            store,
            lock: Arc::new(Mutex::new(())),
            capacity: capacity.max(1),
        }
    }

    /// Appends a run, dropping the oldest entries beyond capacity.
    pub async fn append(&self, record: &SyncRecord) -> StoreResult<()> {
        let _guard = self.lock.lock().await;

        let mut history: Vec<SyncRecord> = load_json(self.store.as_ref(), HISTORY_KEY)
            .await?
            .unwrap_or_default();
        history.push(record.clone());
        if history.len() > self.capacity {
            let excess = history.len() - self.capacity;
            history.drain(..excess);
        }

        save_json(self.store.as_ref(), HISTORY_KEY, &history).await
    }

    /// Returns runs newest first.
    pub async fn list(&self) -> StoreResult<Vec<SyncRecord>> {
        let mut history: Vec<SyncRecord> = load_json(self.store.as_ref(), HISTORY_KEY)
            .await?
            .unwrap_or_default();
        history.reverse();
        Ok(history)
    }

    pub async fn latest(&self) -> StoreResult<Option<SyncRecord>> {
        Ok(self.list().await?.into_iter().next())
    }

    /// Most recent successful run.
    pub async fn latest_success(&self) -> StoreResult<Option<SyncRecord>> {
        Ok(self.list().await?.into_iter().find(SyncRecord::is_success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use chrono::Utc;
    use harbor_core::SyncType;

    fn run(id: &str, ok: bool) -> SyncRecord {
        let mut rec = SyncRecord::start(id, SyncType::Upload, Utc::now());
        if ok {
            rec.finish(Utc::now());
        } else {
            rec.fail("offline", Utc::now());
        }
        rec
    }

    #[tokio::test]
    async fn test_history_is_capped_and_newest_first() {
        let repo = SyncHistoryRepository::with_capacity(Arc::new(MemoryStore::new()), 3);
        for i in 0..5 {
            repo.append(&run(&format!("s{i}"), true)).await.unwrap();
        }

        let ids: Vec<_> = repo.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["s4", "s3", "s2"]);
    }

    #[tokio::test]
    async fn test_latest_success_skips_failures() {
        let repo = SyncHistoryRepository::new(Arc::new(MemoryStore::new()));
        assert!(repo.latest().await.unwrap().is_none());

        repo.append(&run("ok", true)).await.unwrap();
        repo.append(&run("bad", false)).await.unwrap();

        assert_eq!(repo.latest().await.unwrap().unwrap().id, "bad");
        assert_eq!(repo.latest_success().await.unwrap().unwrap().id, "ok");
    }
}
