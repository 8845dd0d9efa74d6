//! # Pending Operation Log
//!
//! Durable FIFO of local mutations whose remote write failed.
//!
//! ## Replay Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Pending Operation Replay                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             @harbor:pending_operations (meta store)             │   │
//! │  │                                                                 │   │
//! │  │  id   | type   | key     | value | attempts | last_error        │   │
//! │  │  ─────┼────────┼─────────┼───────┼──────────┼──────────────     │   │
//! │  │  op-a │ add    │ card:1  │ {...} │ 0        │                   │   │
//! │  │  op-b │ update │ card:2  │ {...} │ 2        │ 503 ...           │   │
//! │  │  op-c │ remove │ card:3  │       │ 0        │                   │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  drain_and_replay(apply)                                               │
//! │                                                                         │
//! │  for op in queue (oldest first):                                       │
//! │     apply(op) ── Ok ──► remove op from the log immediately             │
//! │         │                                                               │
//! │         └──── Err ─► attempts += 1, last_error = e                     │
//! │                      op stays in place, loop continues                 │
//! │                                                                         │
//! │  One failure never aborts the batch. Nothing is reordered or           │
//! │  deduplicated: the remote sees writes in their original order, so the  │
//! │  last write to a key wins.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use harbor_core::{ItemError, Mutation, PendingOperation};
use harbor_store::{KeyValueStore, PendingOperationRepository};

use crate::error::SyncResult;

/// Outcome of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Operations applied and removed from the log.
    pub replayed: u64,
    /// Operations that failed and stay queued.
    pub failed: u64,
    pub errors: Vec<ItemError>,
}

/// Durable log of mutations awaiting remote replay.
#[derive(Clone)]
pub struct PendingOperationLog {
    repo: PendingOperationRepository,
}

impl PendingOperationLog {
    pub fn new(meta: Arc<dyn KeyValueStore>) -> Self {
        PendingOperationLog {
            repo: PendingOperationRepository::new(meta),
        }
    }

    /// Queues a mutation at the tail. Written through before returning.
    pub async fn append(&self, mutation: Mutation) -> SyncResult<PendingOperation> {
        let op = PendingOperation::new(Uuid::new_v4().to_string(), mutation, Utc::now());
        self.repo.push(op.clone()).await?;

        debug!(op_id = %op.id, kind = %op.kind(), key = %op.key(), "Queued pending operation");
        Ok(op)
    }

    /// Replays every queued operation in FIFO order.
    ///
    /// Operations appended while a replay is running are left for the next
    /// pass.
    pub async fn drain_and_replay<F, Fut>(&self, mut apply: F) -> SyncResult<ReplayReport>
    where
        F: FnMut(PendingOperation) -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        let queued = self.repo.list().await?;
        let mut report = ReplayReport::default();

        if queued.is_empty() {
            debug!("No pending operations");
            return Ok(report);
        }

        info!(count = queued.len(), "Replaying pending operations");

        for mut op in queued {
            match apply(op.clone()).await {
                Ok(()) => {
                    self.repo.remove(&op.id).await?;
                    report.replayed += 1;
                }
                Err(e) => {
                    warn!(
                        op_id = %op.id,
                        key = %op.key(),
                        attempts = op.attempts + 1,
                        error = %e,
                        "Pending operation replay failed"
                    );
                    op.attempts += 1;
                    op.last_error = Some(e.to_string());
                    self.repo.update(&op).await?;

                    report.failed += 1;
                    report.errors.push(ItemError::new(op.key(), e.to_string()));
                }
            }
        }

        info!(
            replayed = report.replayed,
            failed = report.failed,
            "Pending operation replay finished"
        );
        Ok(report)
    }

    /// Queued operations, oldest first.
    pub async fn list(&self) -> SyncResult<Vec<PendingOperation>> {
        Ok(self.repo.list().await?)
    }

    pub async fn len(&self) -> SyncResult<usize> {
        Ok(self.repo.count().await?)
    }

    pub async fn is_empty(&self) -> SyncResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drops every queued operation.
    pub async fn clear(&self) -> SyncResult<usize> {
        let dropped = self.repo.clear().await?;
        info!(dropped, "Pending operation log cleared");
        Ok(dropped)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use harbor_store::MemoryStore;
    use std::sync::Mutex;

    fn log() -> PendingOperationLog {
        PendingOperationLog::new(Arc::new(MemoryStore::new()))
    }

    fn keys(ops: &[PendingOperation]) -> Vec<String> {
        ops.iter().map(|o| o.key().to_string()).collect()
    }

    #[tokio::test]
    async fn test_failed_item_stays_and_others_are_removed() {
        let log = log();
        log.append(Mutation::add("a", "1")).await.unwrap();
        log.append(Mutation::update("b", "2")).await.unwrap();
        log.append(Mutation::remove("c")).await.unwrap();

        let attempted = Mutex::new(Vec::new());
        let report = log
            .drain_and_replay(|op| {
                attempted.lock().unwrap().push(op.key().to_string());
                async move {
                    if op.key() == "b" {
                        Err(SyncError::ConnectionFailed("offline".into()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(*attempted.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.replayed, 2);
        assert_eq!(report.failed, 1);

        let remaining = log.list().await.unwrap();
        assert_eq!(keys(&remaining), vec!["b"]);
        assert_eq!(remaining[0].attempts, 1);
        assert!(remaining[0].last_error.is_some());
    }

    #[tokio::test]
    async fn test_failures_keep_relative_order() {
        let log = log();
        for key in ["a", "b", "c", "d"] {
            log.append(Mutation::add(key, "v")).await.unwrap();
        }

        log.drain_and_replay(|op| async move {
            if op.key() == "b" || op.key() == "d" {
                Err(SyncError::Timeout("slow".into()))
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(keys(&log.list().await.unwrap()), vec!["b", "d"]);
    }

    #[tokio::test]
    async fn test_duplicate_writes_replay_in_order() {
        let log = log();
        log.append(Mutation::add("k", "1")).await.unwrap();
        log.append(Mutation::update("k", "2")).await.unwrap();
        log.append(Mutation::update("k", "3")).await.unwrap();

        let seen = Mutex::new(Vec::new());
        let report = log
            .drain_and_replay(|op| {
                seen.lock().unwrap().push(op.mutation.value.clone());
                async { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(report.replayed, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("1".into()), Some("2".into()), Some("3".into())]
        );
        assert!(log.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_clear() {
        let log = log();
        log.append(Mutation::remove("x")).await.unwrap();
        log.append(Mutation::remove("y")).await.unwrap();

        assert_eq!(log.clear().await.unwrap(), 2);
        assert_eq!(log.len().await.unwrap(), 0);
    }
}
