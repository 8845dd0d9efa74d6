//! # SQLite Store
//!
//! SQLite-backed [`KeyValueStore`] with connection pooling.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SQLite Key/Value Store                             │
//! │                                                                         │
//! │  Daemon startup                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteConfig::new(path) ← Configure pool settings                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteDatabase::new(config).await ← Create pool + run migrations      │
//! │       │                                                                 │
//! │       ├── db.namespace("data") ──► SqliteStore (user data)             │
//! │       └── db.namespace("meta") ──► SqliteStore (engine metadata)       │
//! │                                                                         │
//! │  kv_entries                                                            │
//! │  namespace | key          | value        | updated_at                  │
//! │  ──────────┼──────────────┼──────────────┼─────────────                │
//! │  data      │ card:1       │ {...}        │ 2026-...                    │
//! │  meta      │ @harbor:...  │ [...]        │ 2026-...                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File-backed databases run in WAL mode so readers don't block the
//! scheduler's writers.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;
use crate::migrations;

/// Namespace for user data.
pub const DATA_NAMESPACE: &str = "data";

/// Namespace for engine metadata.
pub const META_NAMESPACE: &str = "meta";

// =============================================================================
// Configuration
// =============================================================================

/// SQLite configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = SqliteConfig::new("/var/lib/harbor/harbor.db")
///     .max_connections(4);
/// ```
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file. `None` means in-memory.
    pub database_path: Option<PathBuf>,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub connect_timeout: Duration,

    /// Whether to run migrations on connect.
    pub run_migrations: bool,
}

impl SqliteConfig {
    /// Creates a configuration for a file-backed database.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteConfig {
            database_path: Some(path.into()),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// Creates an in-memory configuration (for testing).
    ///
    /// In-memory databases live only as long as their connection, so the
    /// pool is pinned to exactly one connection that never expires.
    pub fn in_memory() -> Self {
        SqliteConfig {
            database_path: None,
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.is_none()
    }
}

// =============================================================================
// Database
// =============================================================================

/// Pool handle; hands out namespaced stores.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Opens (creating if needed) the database and runs migrations.
    pub async fn new(config: SqliteConfig) -> StoreResult<Self> {
        let connect_options = match &config.database_path {
            Some(path) => {
                info!(path = %path.display(), "Opening SQLite store");
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
            }
            None => {
                info!("Opening in-memory SQLite store");
                SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            }
        };

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        if config.is_in_memory() {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        debug!(max_connections = config.max_connections, "SQLite pool created");

        let db = SqliteDatabase { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    /// Returns a store scoped to `namespace`.
    pub fn namespace(&self, namespace: impl Into<String>) -> SqliteStore {
        SqliteStore {
            pool: self.pool.clone(),
            namespace: namespace.into(),
        }
    }

    /// Store for user data.
    pub fn data_store(&self) -> SqliteStore {
        self.namespace(DATA_NAMESPACE)
    }

    /// Store for engine metadata.
    pub fn meta_store(&self) -> SqliteStore {
        self.namespace(META_NAMESPACE)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        info!("Closing SQLite store");
        self.pool.close().await;
    }
}

// =============================================================================
// Namespaced Store
// =============================================================================

/// A [`KeyValueStore`] over one namespace of `kv_entries`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteStore {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT key FROM kv_entries WHERE namespace = ?1 ORDER BY key",
        )
        .bind(&self.namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::EnumerationFailed(e.to_string()))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2",
        )
        .bind(&self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::read(key, e))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (namespace, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::write(key, e))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::write(key, e))?;

        Ok(())
    }

    /// Removes all keys in one transaction.
    async fn remove_all(&self, keys: &[String]) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        for key in keys {
            sqlx::query("DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2")
                .bind(&self.namespace)
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::write(key.as_str(), e))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        debug!(namespace = %self.namespace, count = keys.len(), "Removed keys");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = SqliteDatabase::new(SqliteConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let db = SqliteDatabase::new(SqliteConfig::in_memory()).await.unwrap();
        let data = db.data_store();
        let meta = db.meta_store();

        data.set("k", "user").await.unwrap();
        meta.set("k", "engine").await.unwrap();

        assert_eq!(data.get("k").await.unwrap(), Some("user".to_string()));
        assert_eq!(meta.get("k").await.unwrap(), Some("engine".to_string()));
        assert_eq!(data.keys().await.unwrap(), vec!["k"]);
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let db = SqliteDatabase::new(SqliteConfig::in_memory()).await.unwrap();
        let store = db.data_store();

        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        store.set("b", "3").await.unwrap();
        store.set("c", "4").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("2".to_string()));

        store.remove("a").await.unwrap();
        assert!(!store.contains("a").await.unwrap());

        store
            .remove_all(&["b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = SqliteConfig::new("/tmp/harbor.db").max_connections(10);
        assert_eq!(config.max_connections, 10);
        assert!(!config.is_in_memory());
        assert!(SqliteConfig::in_memory().is_in_memory());
    }
}
