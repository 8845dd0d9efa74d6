//! # Caller API
//!
//! Entry points for a UI layer. Operational failures come back as a
//! response with `success: false`; caller mistakes come back as a typed
//! [`ApiError`].
//!
//! ## Error Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SyncError → caller                              │
//! │                                                                         │
//! │  Ok(value) ─────────────────────────► Ok({ success: true, data })       │
//! │                                                                         │
//! │  Store / transport / internal ──────► Ok({ success: false, error })     │
//! │                                                                         │
//! │  Invalid sync type, validation,                                         │
//! │  backup not found / not completed,                                      │
//! │  no remote, sync in progress ───────► Err(ApiError { code, message })   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A restore with per-key errors is still a success; callers inspect
//! `data.errors`. A sync whose transport failed returns `success: false`
//! together with the failed record.

use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use harbor_core::{
    BackupStats, BackupSummary, Mutation, RestoreOptions, RestoreReport, SyncRecord, SyncType,
};

use crate::backup::BackupOptions;
use crate::coordinator::{MutationOutcome, SyncStatusReport};
use crate::engine::HarborEngine;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Response Types
// =============================================================================

/// Result envelope returned by every API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            error: Some(error.into()),
            data: None,
        }
    }
}

/// Typed error for caller mistakes.
///
/// ```json
/// { "code": "NOT_FOUND", "message": "Backup not found: bk_20260101T000000000_000001" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorCode {
    /// Unknown backup id.
    NotFound,

    /// Bad key, id, limit or mutation.
    ValidationError,

    /// Backup exists but is not restorable.
    InvalidState,

    /// Missing remote, invalid configuration or unknown sync type.
    ConfigError,

    /// Another sync is running; retry later.
    SyncInProgress,

    StorageError,

    RemoteError,

    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let code = match &err {
            SyncError::BackupNotFound(_) => ErrorCode::NotFound,
            SyncError::Validation(_) => ErrorCode::ValidationError,
            SyncError::BackupNotCompleted { .. } => ErrorCode::InvalidState,
            SyncError::InvalidConfig(_)
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_)
            | SyncError::RemoteNotConfigured => ErrorCode::ConfigError,
            SyncError::SyncAlreadyInProgress => ErrorCode::SyncInProgress,
            SyncError::Store(_) => ErrorCode::StorageError,
            e if e.is_retryable() => ErrorCode::RemoteError,
            _ => ErrorCode::Internal,
        };
        ApiError::new(code, err.to_string())
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

fn respond<T>(operation: &str, result: SyncResult<T>) -> ApiResult<T> {
    match result {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) if e.is_config_error() || e.is_concurrency_error() => Err(e.into()),
        Err(e) => {
            warn!(operation, error = %e, "API call failed");
            Ok(ApiResponse::failed(e.to_string()))
        }
    }
}

// =============================================================================
// Backups
// =============================================================================

pub async fn create_full_backup(
    engine: &HarborEngine,
    opts: BackupOptions,
) -> ApiResult<BackupSummary> {
    let result = engine.backups().create_full(opts).await;
    respond("create_full_backup", result.map(|r| r.summary))
}

pub async fn create_incremental_backup(
    engine: &HarborEngine,
    opts: BackupOptions,
) -> ApiResult<BackupSummary> {
    let result = engine.backups().create_incremental(opts).await;
    respond("create_incremental_backup", result.map(|r| r.summary))
}

pub async fn create_selective_backup(
    engine: &HarborEngine,
    keys: &[String],
    opts: BackupOptions,
) -> ApiResult<BackupSummary> {
    let result = engine.backups().create_selective(keys, opts).await;
    respond("create_selective_backup", result.map(|r| r.summary))
}

pub async fn restore_backup(
    engine: &HarborEngine,
    id: &str,
    opts: RestoreOptions,
) -> ApiResult<RestoreReport> {
    respond("restore_backup", engine.backups().restore(id, opts).await)
}

/// Summaries newest first.
pub async fn get_backup_list(
    engine: &HarborEngine,
    limit: usize,
    offset: usize,
) -> ApiResult<Vec<BackupSummary>> {
    respond("get_backup_list", engine.backups().list(limit, offset).await)
}

pub async fn get_backup_stats(engine: &HarborEngine) -> ApiResult<BackupStats> {
    respond("get_backup_stats", engine.backups().stats().await)
}

pub async fn delete_backup(engine: &HarborEngine, id: &str) -> ApiResult<()> {
    respond("delete_backup", engine.backups().delete(id).await)
}

// =============================================================================
// Sync
// =============================================================================

/// Runs a sync of the named type: `upload`, `download` or `bidirectional`.
pub async fn sync_to_cloud(engine: &HarborEngine, sync_type: &str) -> ApiResult<SyncRecord> {
    let sync_type: SyncType = sync_type
        .parse()
        .map_err(|e: harbor_core::CoreError| ApiError::from(SyncError::from(e)))?;

    let record = match respond("sync_to_cloud", engine.sync().sync_to_cloud(sync_type).await)? {
        ApiResponse {
            data: Some(record), ..
        } => record,
        failed => return Ok(failed),
    };

    if record.is_success() {
        Ok(ApiResponse::ok(record))
    } else {
        Ok(ApiResponse {
            success: false,
            error: record.error.clone(),
            data: Some(record),
        })
    }
}

pub async fn apply_mutation(engine: &HarborEngine, mutation: Mutation) -> ApiResult<MutationOutcome> {
    respond("apply_mutation", engine.sync().apply_mutation(mutation).await)
}

pub async fn get_sync_status(engine: &HarborEngine) -> ApiResult<SyncStatusReport> {
    respond("get_sync_status", engine.sync().status().await)
}

pub async fn get_sync_history(engine: &HarborEngine, limit: usize) -> ApiResult<Vec<SyncRecord>> {
    respond("get_sync_history", engine.sync().history(limit).await)
}

// =============================================================================
// Unit Tests
// =============================================================================
