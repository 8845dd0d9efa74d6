//! # Remote Protocol
//!
//! Request and response bodies for the remote backup endpoint.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Remote Backup Endpoint                             │
//! │                                                                         │
//! │  UPLOAD (full push)                                                    │
//! │  ──────────────────                                                    │
//! │  device ───► POST /backup/upload                                       │
//! │              { data: {k: v, ...}, timestamp, deviceId }                │
//! │  device ◄─── 200 OK                                                    │
//! │                                                                         │
//! │  DOWNLOAD                                                              │
//! │  ────────                                                              │
//! │  device ───► GET /backup/download                                      │
//! │  device ◄─── 200 OK { backup: {k: v, ...} }                            │
//! │                                                                         │
//! │  OPERATION REPLAY (one mutation)                                       │
//! │  ───────────────────────────────                                       │
//! │  device ───► POST /backup/operations                                   │
//! │              { type: add|update|remove, key, value?, timestamp,        │
//! │                deviceId }                                              │
//! │  device ◄─── 200 OK                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps are Unix epoch milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harbor_core::{ContentMap, Mutation, OperationKind};

pub const UPLOAD_PATH: &str = "backup/upload";
pub const DOWNLOAD_PATH: &str = "backup/download";
pub const OPERATIONS_PATH: &str = "backup/operations";

/// Body of `POST /backup/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub data: ContentMap,
    pub timestamp: i64,
    pub device_id: String,
}

impl UploadRequest {
    pub fn new(data: ContentMap, device_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        UploadRequest {
            data,
            timestamp: at.timestamp_millis(),
            device_id: device_id.into(),
        }
    }
}

/// Body of a `GET /backup/download` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResponse {
    #[serde(default)]
    pub backup: ContentMap,
}

/// Body of `POST /backup/operations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub timestamp: i64,
    pub device_id: String,
}

impl OperationRequest {
    pub fn new(mutation: &Mutation, device_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        OperationRequest {
            kind: mutation.kind,
            key: mutation.key.clone(),
            value: mutation.value.clone(),
            timestamp: at.timestamp_millis(),
            device_id: device_id.into(),
        }
    }
}
