//! # Domain Types
//!
//! Records exchanged between the backup manager, the sync coordinator and
//! the caller-facing API.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  BackupSummary  │   │  BackupRecord   │   │ PendingOperation│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, sequence   │◄──│  summary        │   │  id (UUID)      │       │
//! │  │  type, status   │   │  content        │   │  kind, key      │       │
//! │  │  size, items    │   │  deleted_keys   │   │  value          │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   BackupType    │   │  BackupStatus   │   │   SyncRecord    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Full           │   │  Pending        │   │  id, type       │       │
//! │  │  Incremental    │   │  InProgress     │   │  status         │       │
//! │  │  Selective      │   │  Completed      │   │  uploaded       │       │
//! │  └─────────────────┘   │  Failed         │   │  downloaded     │       │
//! │                        │  Cancelled      │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Summary vs Record
//! The backup index only holds [`BackupSummary`] values. The captured
//! key/value content is stored separately and joined back into a
//! [`BackupRecord`] when a caller asks for a specific backup.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Captured key/value content. Ordered so serialization is deterministic.
pub type ContentMap = BTreeMap<String, String>;

/// Byte length of the JSON serialization of a content map.
pub fn content_size(content: &ContentMap) -> u64 {
    serde_json::to_string(content)
        .map(|s| s.len() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Backup Type
// =============================================================================

/// Kind of backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum BackupType {
    /// Every key in the store.
    Full,
    /// Keys changed or added since a base backup.
    Incremental,
    /// A caller-chosen subset of keys.
    Selective,
}

impl BackupType {
    /// Returns true if a backup of this type can act as an incremental base.
    pub fn can_be_base(&self) -> bool {
        matches!(self, BackupType::Full | BackupType::Incremental)
    }

    /// All backup types, in display order.
    pub const ALL: [BackupType; 3] = [
        BackupType::Full,
        BackupType::Incremental,
        BackupType::Selective,
    ];
}

impl std::fmt::Display for BackupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupType::Full => write!(f, "full"),
            BackupType::Incremental => write!(f, "incremental"),
            BackupType::Selective => write!(f, "selective"),
        }
    }
}

impl std::str::FromStr for BackupType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(BackupType::Full),
            "incremental" => Ok(BackupType::Incremental),
            "selective" => Ok(BackupType::Selective),
            other => Err(CoreError::InvalidBackupType(other.to_string())),
        }
    }
}

// =============================================================================
// Backup Status
// =============================================================================

/// Lifecycle status of a backup.
///
/// ## State Machine
/// ```text
/// ┌────────────┐  complete()   ┌───────────┐
/// │ InProgress │ ────────────► │ Completed │ ──► last_restored_at may be set
/// └─────┬──────┘               └───────────┘
///       │ fail()
///       ▼
/// ┌────────────┐
/// │   Failed   │
/// └────────────┘
/// ```
/// `Pending` and `Cancelled` exist for callers that track queued work;
/// the engine itself never produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum BackupStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl BackupStatus {
    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BackupStatus::Completed | BackupStatus::Failed | BackupStatus::Cancelled
        )
    }

    /// All statuses, in lifecycle order.
    pub const ALL: [BackupStatus; 5] = [
        BackupStatus::Pending,
        BackupStatus::InProgress,
        BackupStatus::Completed,
        BackupStatus::Failed,
        BackupStatus::Cancelled,
    ];
}

impl std::fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupStatus::Pending => write!(f, "pending"),
            BackupStatus::InProgress => write!(f, "in_progress"),
            BackupStatus::Completed => write!(f, "completed"),
            BackupStatus::Failed => write!(f, "failed"),
            BackupStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// =============================================================================
// Backup Summary & Record
// =============================================================================

/// Index entry for a backup (content elided).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BackupSummary {
    /// Opaque id, ordered by creation (`bk_<timestamp>_<sequence>`).
    pub id: String,

    /// Monotonic creation sequence; breaks `created_at` ties.
    pub sequence: u64,

    #[serde(rename = "type")]
    pub backup_type: BackupType,

    pub status: BackupStatus,

    pub created_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Set only for incremental backups.
    pub base_backup_id: Option<String>,

    /// Set only for selective backups.
    pub selected_keys: Option<Vec<String>>,

    /// Byte length of the serialized content.
    pub size: u64,

    pub item_count: u64,

    /// Number of deletions recorded against the base (incremental only).
    #[serde(default)]
    pub deleted_count: u64,

    #[serde(default)]
    pub description: Option<String>,

    /// Failure reason for `Failed` backups.
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub last_restored_at: Option<DateTime<Utc>>,
}

impl BackupSummary {
    /// Ordering key used everywhere backups are sorted by creation.
    pub fn creation_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }

    pub fn is_completed(&self) -> bool {
        self.status == BackupStatus::Completed
    }
}

/// A backup together with its captured content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BackupRecord {
    #[serde(flatten)]
    pub summary: BackupSummary,

    /// Keys and values actually captured.
    pub content: ContentMap,

    /// Keys present in the base state but gone at capture time
    /// (incremental only). Never part of `content`.
    #[serde(default)]
    pub deleted_keys: Vec<String>,
}

impl BackupRecord {
    /// Starts a new backup in `InProgress`.
    pub fn begin(
        id: impl Into<String>,
        sequence: u64,
        backup_type: BackupType,
        created_at: DateTime<Utc>,
    ) -> Self {
        BackupRecord {
            summary: BackupSummary {
                id: id.into(),
                sequence,
                backup_type,
                status: BackupStatus::InProgress,
                created_at,
                completed_at: None,
                base_backup_id: None,
                selected_keys: None,
                size: 0,
                item_count: 0,
                deleted_count: 0,
                description: None,
                error: None,
                last_restored_at: None,
            },
            content: ContentMap::new(),
            deleted_keys: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.summary.id
    }

    pub fn backup_type(&self) -> BackupType {
        self.summary.backup_type
    }

    pub fn status(&self) -> BackupStatus {
        self.summary.status
    }

    /// Transitions `InProgress -> Completed`, fixing content, size and count.
    pub fn complete(
        &mut self,
        content: ContentMap,
        deleted_keys: Vec<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.transition(BackupStatus::Completed)?;
        self.summary.size = content_size(&content);
        self.summary.item_count = content.len() as u64;
        self.summary.deleted_count = deleted_keys.len() as u64;
        self.summary.completed_at = Some(now);
        self.content = content;
        self.deleted_keys = deleted_keys;
        Ok(())
    }

    /// Transitions `InProgress -> Failed` with a reason.
    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(BackupStatus::Failed)?;
        self.summary.error = Some(reason.into());
        self.summary.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, to: BackupStatus) -> CoreResult<()> {
        if self.summary.status != BackupStatus::InProgress {
            return Err(CoreError::InvalidTransition {
                id: self.summary.id.clone(),
                from: self.summary.status,
                to,
            });
        }
        self.summary.status = to;
        Ok(())
    }
}

// =============================================================================
// Restore
// =============================================================================

/// Options for restoring a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct RestoreOptions {
    /// Full: clear the store first. Incremental/selective: replace
    /// existing keys instead of only filling in missing ones.
    pub overwrite: bool,

    /// Remove keys recorded as deleted by an incremental backup.
    /// Only honoured together with `overwrite`.
    pub apply_deletions: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        RestoreOptions {
            overwrite: true,
            apply_deletions: false,
        }
    }
}

/// Failure for a single key inside a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemError {
    pub key: String,
    pub message: String,
}

impl ItemError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        ItemError {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RestoreReport {
    pub backup_id: String,
    pub restored_items: u64,
    /// Entries left alone because the key existed and `overwrite` was off.
    pub skipped_items: u64,
    pub deleted_items: u64,
    pub errors: Vec<ItemError>,
}

impl RestoreReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Aggregate statistics over the backup index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BackupStats {
    pub total: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_status: BTreeMap<String, u64>,
    pub total_size: u64,
    pub average_size: u64,
    pub latest_backup_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Pending Operations
// =============================================================================

/// Kind of local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OperationKind {
    Add,
    Remove,
    Update,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Add => write!(f, "add"),
            OperationKind::Remove => write!(f, "remove"),
            OperationKind::Update => write!(f, "update"),
        }
    }
}

/// A local mutation that must also reach the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Mutation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub key: String,
    /// Absent for removals.
    pub value: Option<String>,
}

impl Mutation {
    pub fn add(key: impl Into<String>, value: impl Into<String>) -> Self {
        Mutation {
            kind: OperationKind::Add,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn update(key: impl Into<String>, value: impl Into<String>) -> Self {
        Mutation {
            kind: OperationKind::Update,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Mutation {
            kind: OperationKind::Remove,
            key: key.into(),
            value: None,
        }
    }
}

/// A mutation queued for remote replay after a failed remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PendingOperation {
    pub id: String,

    #[serde(flatten)]
    pub mutation: Mutation,

    pub queued_at: DateTime<Utc>,

    /// Failed replay attempts so far.
    #[serde(default)]
    pub attempts: u32,

    #[serde(default)]
    pub last_error: Option<String>,
}

impl PendingOperation {
    pub fn new(id: impl Into<String>, mutation: Mutation, queued_at: DateTime<Utc>) -> Self {
        PendingOperation {
            id: id.into(),
            mutation,
            queued_at,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.mutation.kind
    }

    pub fn key(&self) -> &str {
        &self.mutation.key
    }
}

// =============================================================================
// Sync Records
// =============================================================================

/// Direction of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncType {
    /// Push the full local store.
    Upload,
    /// Apply the remote payload locally, remote wins.
    Download,
    /// Download, then upload.
    Bidirectional,
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncType::Upload => write!(f, "upload"),
            SyncType::Download => write!(f, "download"),
            SyncType::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

impl std::str::FromStr for SyncType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upload" | "push" => Ok(SyncType::Upload),
            "download" | "pull" => Ok(SyncType::Download),
            "bidirectional" | "both" => Ok(SyncType::Bidirectional),
            other => Err(CoreError::InvalidSyncType(other.to_string())),
        }
    }
}

/// Status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncRunStatus {
    InProgress,
    Completed,
    Failed,
}

/// History entry for one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncRecord {
    pub id: String,

    #[serde(rename = "type")]
    pub sync_type: SyncType,

    pub status: SyncRunStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub uploaded_items: u64,

    pub downloaded_items: u64,

    /// Pending operations replayed successfully before the run.
    #[serde(default)]
    pub replayed_operations: u64,

    /// Pending operations still queued after the run.
    #[serde(default)]
    pub failed_operations: u64,

    /// Keys that could not be written locally during a download.
    #[serde(default)]
    pub item_errors: Vec<ItemError>,

    #[serde(default)]
    pub error: Option<String>,
}

impl SyncRecord {
    pub fn start(id: impl Into<String>, sync_type: SyncType, now: DateTime<Utc>) -> Self {
        SyncRecord {
            id: id.into(),
            sync_type,
            status: SyncRunStatus::InProgress,
            started_at: now,
            completed_at: None,
            uploaded_items: 0,
            downloaded_items: 0,
            replayed_operations: 0,
            failed_operations: 0,
            item_errors: Vec::new(),
            error: None,
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.status = SyncRunStatus::Completed;
        self.completed_at = Some(now);
    }

    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = SyncRunStatus::Failed;
        self.error = Some(reason.into());
        self.completed_at = Some(now);
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncRunStatus::Completed
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
