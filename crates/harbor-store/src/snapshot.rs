//! # Content Snapshotter
//!
//! Reads the key space of a [`KeyValueStore`] into a [`ContentMap`]. This is
//! the only code that walks the whole store; backup policy stays unaware of
//! how storage is laid out.
//!
//! ## Failure Policy
//! ```text
//! keys() fails          → whole snapshot fails (EnumerationFailed)
//! get(key) fails        → key skipped, logged, reported in `skipped`
//! get(key) returns None → key vanished between listing and read; omitted
//! reserved key          → omitted only with skip_reserved (shared store)
//! ```

use std::sync::Arc;

use harbor_core::{content_size, is_reserved_key, ContentMap, ItemError};
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::kv::KeyValueStore;

/// A point-in-time copy of (part of) the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub content: ContentMap,
    /// Keys that could not be read.
    pub skipped: Vec<ItemError>,
}

impl Snapshot {
    /// Byte length of the serialized content.
    pub fn size(&self) -> u64 {
        content_size(&self.content)
    }

    pub fn item_count(&self) -> usize {
        self.content.len()
    }
}

/// Takes snapshots of a store.
#[derive(Clone)]
pub struct ContentSnapshotter {
    store: Arc<dyn KeyValueStore>,
    skip_reserved: bool,
}

impl ContentSnapshotter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        ContentSnapshotter {
            store,
            skip_reserved: false,
        }
    }

    /// Leaves reserved keys out of every snapshot. Set when the store also
    /// holds engine metadata.
    pub fn skip_reserved(mut self, skip: bool) -> Self {
        self.skip_reserved = skip;
        self
    }

    /// Returns true if `key` is engine metadata rather than user data.
    pub fn excludes(&self, key: &str) -> bool {
        self.skip_reserved && is_reserved_key(key)
    }

    /// Snapshots every key that is not excluded.
    pub async fn snapshot(&self) -> StoreResult<Snapshot> {
        let keys = self.store.keys().await?;
        let snapshot = self.read_keys(keys.iter().map(String::as_str)).await;

        debug!(
            items = snapshot.item_count(),
            skipped = snapshot.skipped.len(),
            "Snapshot taken"
        );
        Ok(snapshot)
    }

    /// Snapshots only `keys`; missing keys are silently omitted.
    pub async fn snapshot_keys<S: AsRef<str>>(&self, keys: &[S]) -> Snapshot {
        self.read_keys(keys.iter().map(|k| k.as_ref())).await
    }

    async fn read_keys<'a>(&self, keys: impl Iterator<Item = &'a str>) -> Snapshot {
        let mut snapshot = Snapshot::default();
        let mut excluded = 0usize;

        for key in keys {
            if self.excludes(key) {
                excluded += 1;
                continue;
            }
            match self.store.get(key).await {
                Ok(Some(value)) => {
                    snapshot.content.insert(key.to_string(), value);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping unreadable key");
                    snapshot.skipped.push(ItemError::new(key, e.to_string()));
                }
            }
        }

        if excluded > 0 {
            debug!(excluded, "Engine metadata keys left out of snapshot");
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::kv::MemoryStore;

    #[tokio::test]
    async fn test_snapshot_skips_reserved_and_unreadable_keys() {
        let store = Arc::new(MemoryStore::with_entries([
            ("a", "1"),
            ("b", "2"),
            ("@harbor:backup_index", "[]"),
        ]));
        store.fail_reads_for("b");

        let snapshotter = ContentSnapshotter::new(store.clone()).skip_reserved(true);
        let snap = snapshotter.snapshot().await.unwrap();

        assert_eq!(snap.content.len(), 1);
        assert_eq!(snap.content["a"], "1");
        assert_eq!(snap.skipped.len(), 1);
        assert_eq!(snap.skipped[0].key, "b");
        assert_eq!(snap.size(), r#"{"a":"1"}"#.len() as u64);
    }

    #[tokio::test]
    async fn test_reserved_prefix_is_user_data_in_a_dedicated_store() {
        let store = Arc::new(MemoryStore::with_entries([
            ("a", "1"),
            ("@harbor:user-note", "important"),
        ]));

        let snapshotter = ContentSnapshotter::new(store);
        let snap = snapshotter.snapshot().await.unwrap();

        assert_eq!(snap.item_count(), 2);
        assert_eq!(snap.content["@harbor:user-note"], "important");
        assert!(!snapshotter.excludes("@harbor:user-note"));
    }

    #[tokio::test]
    async fn test_snapshot_fails_when_enumeration_fails() {
        let store = Arc::new(MemoryStore::with_entries([("a", "1")]));
        store.set_fail_enumeration(true);

        let result = ContentSnapshotter::new(store).snapshot().await;
        assert!(matches!(result, Err(StoreError::EnumerationFailed(_))));
    }

    #[tokio::test]
    async fn test_selected_keys_omit_missing() {
        let store = Arc::new(MemoryStore::with_entries([("a", "1"), ("b", "2"), ("c", "3")]));

        let snap = ContentSnapshotter::new(store)
            .snapshot_keys(&["a", "c", "zzz"])
            .await;

        assert_eq!(snap.content.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(snap.skipped.is_empty());
    }
}
