//! # Key/Value Store Interface
//!
//! The engine consumes an externally owned, string-keyed persistent store.
//! Every call may fail independently per key.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     KeyValueStore implementations                       │
//! │                                                                         │
//! │  ┌──────────────────────┐        ┌──────────────────────────────────┐  │
//! │  │     MemoryStore      │        │          SqliteStore             │  │
//! │  │                      │        │                                  │  │
//! │  │  BTreeMap behind a   │        │  kv_entries table, one handle    │  │
//! │  │  RwLock. Failures    │        │  per namespace ("data", "meta")  │  │
//! │  │  can be injected per │        │  sharing a single pool           │  │
//! │  │  key for tests       │        │                                  │  │
//! │  └──────────────────────┘        └──────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// A persistent string-keyed store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Lists every key currently in the store.
    async fn keys(&self) -> StoreResult<Vec<String>>;

    /// Reads a key. `Ok(None)` means the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a key, replacing any existing value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Removes several keys.
    async fn remove_all(&self, keys: &[String]) -> StoreResult<()>;

    /// Returns true if the key exists.
    async fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Returns true when both handles point at the same store instance.
pub fn is_same_store(a: &Arc<dyn KeyValueStore>, b: &Arc<dyn KeyValueStore>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store.
///
/// Used by tests and by callers that only need an ephemeral engine.
/// Individual keys can be made to fail on read or write, and enumeration
/// can be made to fail, to exercise per-item error handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    failing_reads: RwLock<HashSet<String>>,
    failing_writes: RwLock<HashSet<String>>,
    fail_enumeration: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with entries.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut map) = store.entries.write() {
            map.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        store
    }

    /// Returns a copy of every entry.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.entries
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes reads of `key` fail until failures are cleared.
    pub fn fail_reads_for(&self, key: impl Into<String>) {
        if let Ok(mut set) = self.failing_reads.write() {
            set.insert(key.into());
        }
    }

    /// Makes writes and removals of `key` fail until failures are cleared.
    pub fn fail_writes_for(&self, key: impl Into<String>) {
        if let Ok(mut set) = self.failing_writes.write() {
            set.insert(key.into());
        }
    }

    /// Makes `keys()` fail until reset.
    pub fn set_fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    pub fn clear_failures(&self) {
        if let Ok(mut set) = self.failing_reads.write() {
            set.clear();
        }
        if let Ok(mut set) = self.failing_writes.write() {
            set.clear();
        }
        self.set_fail_enumeration(false);
    }

    fn read_fails(&self, key: &str) -> bool {
        self.failing_reads
            .read()
            .map(|s| s.contains(key))
            .unwrap_or(false)
    }

    fn write_fails(&self, key: &str) -> bool {
        self.failing_writes
            .read()
            .map(|s| s.contains(key))
            .unwrap_or(false)
    }
}

fn poisoned() -> StoreError {
    StoreError::Internal("memory store lock poisoned".into())
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(StoreError::EnumerationFailed("injected failure".into()));
        }
        let map = self.entries.read().map_err(|_| poisoned())?;
        Ok(map.keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if self.read_fails(key) {
            return Err(StoreError::read(key, "injected failure"));
        }
        let map = self.entries.read().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.write_fails(key) {
            return Err(StoreError::write(key, "injected failure"));
        }
        let mut map = self.entries.write().map_err(|_| poisoned())?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        if self.write_fails(key) {
            return Err(StoreError::write(key, "injected failure"));
        }
        let mut map = self.entries.write().map_err(|_| poisoned())?;
        map.remove(key);
        Ok(())
    }

    async fn remove_all(&self, keys: &[String]) -> StoreResult<()> {
        if let Some(bad) = keys.iter().find(|k| self.write_fails(k)) {
            return Err(StoreError::write(bad.as_str(), "injected failure"));
        }
        let mut map = self.entries.write().map_err(|_| poisoned())?;
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
