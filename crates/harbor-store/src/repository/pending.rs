//! Pending operation repository.
//!
//! Holds mutations whose remote write failed, oldest first.

use std::sync::Arc;

use harbor_core::PendingOperation;
use tokio::sync::Mutex;

use super::{load_json, save_json};
use crate::error::StoreResult;
use crate::kv::KeyValueStore;

const PENDING_KEY: &str = "@harbor:pending_operations";

/// FIFO list of pending operations.
#[derive(Clone)]
pub struct PendingOperationRepository {
    store: Arc<dyn KeyValueStore>,
    lock: Arc<Mutex<()>>,
}

impl PendingOperationRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        PendingOperationRepository {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the queue, oldest first.
    pub async fn list(&self) -> StoreResult<Vec<PendingOperation>> {
        Ok(load_json(self.store.as_ref(), PENDING_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn count(&self) -> StoreResult<usize> {
        Ok(self.list().await?.len())
    }

    /// Appends to the back of the queue.
    pub async fn push(&self, op: PendingOperation) -> StoreResult<()> {
        self.modify(|ops| ops.push(op)).await
    }

    /// Removes one operation by id. Returns false if it was not queued.
    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        let mut found = false;
        self.modify(|ops| {
            let before = ops.len();
            ops.retain(|op| op.id != id);
            found = ops.len() != before;
        })
        .await?;
        Ok(found)
    }

    /// Replaces an operation in place, keeping its queue position.
    pub async fn update(&self, op: &PendingOperation) -> StoreResult<bool> {
        let mut found = false;
        self.modify(|ops| {
            if let Some(slot) = ops.iter_mut().find(|o| o.id == op.id) {
                *slot = op.clone();
                found = true;
            }
        })
        .await?;
        Ok(found)
    }

    /// Drops every queued operation. Returns how many were dropped.
    pub async fn clear(&self) -> StoreResult<usize> {
        let mut dropped = 0;
        self.modify(|ops| {
            dropped = ops.len();
            ops.clear();
        })
        .await?;
        Ok(dropped)
    }

    async fn modify<F>(&self, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Vec<PendingOperation>) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut ops = self.list().await?;
        f(&mut ops);
        save_json(self.store.as_ref(), PENDING_KEY, &ops).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use chrono::Utc;
    use harbor_core::Mutation;

    fn op(id: &str) -> PendingOperation {
        PendingOperation::new(id, Mutation::add(format!("key-{id}"), "v"), Utc::now())
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let repo = PendingOperationRepository::new(Arc::new(MemoryStore::new()));
        repo.push(op("1")).await.unwrap();
        repo.push(op("2")).await.unwrap();
        repo.push(op("3")).await.unwrap();

        let ids: Vec<_> = repo.list().await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_remove_and_update() {
        let repo = PendingOperationRepository::new(Arc::new(MemoryStore::new()));
        repo.push(op("1")).await.unwrap();
        repo.push(op("2")).await.unwrap();

        assert!(repo.remove("1").await.unwrap());
        assert!(!repo.remove("1").await.unwrap());

        let mut second = op("2");
        second.attempts = 3;
        assert!(repo.update(&second).await.unwrap());

        let ops = repo.list().await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_concurrent_pushes_are_not_lost() {
        let repo = PendingOperationRepository::new(Arc::new(MemoryStore::new()));

        let mut tasks = Vec::new();
        for i in 0..25 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                repo.push(op(&i.to_string())).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(repo.count().await.unwrap(), 25);
        assert_eq!(repo.clear().await.unwrap(), 25);
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
