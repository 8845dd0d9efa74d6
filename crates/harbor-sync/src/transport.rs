//! # Remote Transport
//!
//! The seam between the engine and the remote backup endpoint.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   RemoteBackupService implementations                   │
//! │                                                                         │
//! │  ┌──────────────────────────────┐    ┌──────────────────────────────┐  │
//! │  │          HttpRemote          │    │         MemoryRemote         │  │
//! │  │                              │    │                              │  │
//! │  │  reqwest client with a       │    │  ContentMap behind a lock.   │  │
//! │  │  per-request timeout.        │    │  Can be taken offline or     │  │
//! │  │  Non-2xx → SyncError::Remote │    │  made to reject keys, for    │  │
//! │  │  I/O     → ConnectionFailed  │    │  tests and local-only runs   │  │
//! │  └──────────────────────────────┘    └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error an implementation returns is a transport error
//! ([`SyncError::is_retryable`]); a failed operation write is what sends a
//! mutation to the pending log.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use harbor_core::{ContentMap, Mutation, OperationKind};

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    DownloadResponse, OperationRequest, UploadRequest, DOWNLOAD_PATH, OPERATIONS_PATH,
    UPLOAD_PATH,
};

/// The remote side of a sync.
#[async_trait]
pub trait RemoteBackupService: Send + Sync {
    /// Replaces the remote payload with `data`.
    async fn upload(&self, data: &ContentMap) -> SyncResult<()>;

    /// Fetches the remote payload.
    async fn download(&self) -> SyncResult<ContentMap>;

    /// Applies a single mutation remotely.
    async fn apply_operation(&self, mutation: &Mutation) -> SyncResult<()>;
}

// =============================================================================
// HTTP Remote
// =============================================================================

/// Configuration for [`HttpRemote`].
#[derive(Debug, Clone)]
pub struct HttpRemoteConfig {
    /// Base URL; endpoint paths are resolved relative to it.
    pub base_url: String,

    /// Sent as `deviceId` with every write.
    pub device_id: String,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// `RemoteBackupService` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
    device_id: String,
}

impl HttpRemote {
    pub fn new(config: HttpRemoteConfig) -> SyncResult<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "Remote URL must start with http:// or https://, got: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client build failed: {e}")))?;

        info!(base_url = %base_url, timeout = ?config.request_timeout, "HTTP remote configured");

        Ok(HttpRemote {
            client,
            base_url,
            device_id: config.device_id,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Turns a non-2xx response into [`SyncError::Remote`].
    async fn check(response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SyncError::Remote {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        })
    }
}

#[async_trait]
impl RemoteBackupService for HttpRemote {
    async fn upload(&self, data: &ContentMap) -> SyncResult<()> {
        let body = UploadRequest::new(data.clone(), self.device_id.as_str(), Utc::now());
        let response = self
            .client
            .post(self.endpoint(UPLOAD_PATH)?)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        debug!(items = data.len(), "Uploaded payload");
        Ok(())
    }

    async fn download(&self) -> SyncResult<ContentMap> {
        let response = self
            .client
            .get(self.endpoint(DOWNLOAD_PATH)?)
            .send()
            .await?;
        let payload: DownloadResponse = Self::check(response).await?.json().await?;

        debug!(items = payload.backup.len(), "Downloaded payload");
        Ok(payload.backup)
    }

    async fn apply_operation(&self, mutation: &Mutation) -> SyncResult<()> {
        let body = OperationRequest::new(mutation, self.device_id.as_str(), Utc::now());
        let response = self
            .client
            .post(self.endpoint(OPERATIONS_PATH)?)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        debug!(kind = %mutation.kind, key = %mutation.key, "Applied remote operation");
        Ok(())
    }
}

// =============================================================================
// Memory Remote
// =============================================================================

/// In-memory remote.
///
/// Holds one payload and applies operations to it the way the remote
/// endpoint would. Can be switched offline, or made to reject individual
/// keys, to exercise transport failure paths.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    data: RwLock<ContentMap>,
    applied: RwLock<Vec<Mutation>>,
    rejected_keys: RwLock<HashSet<String>>,
    offline: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: ContentMap) -> Self {
        let remote = Self::new();
        if let Ok(mut map) = remote.data.write() {
            *map = data;
        }
        remote
    }

    /// Current remote payload.
    pub fn data(&self) -> ContentMap {
        self.data.read().map(|m| m.clone()).unwrap_or_default()
    }

    /// Mutations applied so far, in order.
    pub fn applied(&self) -> Vec<Mutation> {
        self.applied.read().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes operations on `key` fail until cleared.
    pub fn reject_key(&self, key: impl Into<String>) {
        if let Ok(mut set) = self.rejected_keys.write() {
            set.insert(key.into());
        }
    }

    pub fn clear_rejections(&self) {
        if let Ok(mut set) = self.rejected_keys.write() {
            set.clear();
        }
    }

    fn ensure_online(&self) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed("remote offline".into()));
        }
        Ok(())
    }
}

fn poisoned() -> SyncError {
    SyncError::Internal("memory remote lock poisoned".into())
}

#[async_trait]
impl RemoteBackupService for MemoryRemote {
    async fn upload(&self, data: &ContentMap) -> SyncResult<()> {
        self.ensure_online()?;
        let mut map = self.data.write().map_err(|_| poisoned())?;
        *map = data.clone();
        Ok(())
    }

    async fn download(&self) -> SyncResult<ContentMap> {
        self.ensure_online()?;
        Ok(self.data())
    }

    async fn apply_operation(&self, mutation: &Mutation) -> SyncResult<()> {
        self.ensure_online()?;

        let rejected = self
            .rejected_keys
            .read()
            .map(|s| s.contains(&mutation.key))
            .unwrap_or(false);
        if rejected {
            return Err(SyncError::Remote {
                status: 503,
                message: format!("rejected {}", mutation.key),
            });
        }

        {
            let mut map = self.data.write().map_err(|_| poisoned())?;
            match (mutation.kind, &mutation.value) {
                (OperationKind::Remove, _) => {
                    map.remove(&mutation.key);
                }
                (_, Some(value)) => {
                    map.insert(mutation.key.clone(), value.clone());
                }
                (_, None) => {}
            }
        }

        self.applied
            .write()
            .map_err(|_| poisoned())?
            .push(mutation.clone());
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
