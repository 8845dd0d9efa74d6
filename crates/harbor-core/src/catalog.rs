//! # Backup Catalog Queries
//!
//! Listing, pagination and statistics over backup summaries. Listing order
//! is always newest first by creation, independent of storage order.

use std::collections::BTreeMap;

use crate::types::{BackupStatus, BackupStats, BackupSummary, BackupType};

/// Sorts summaries newest first.
pub fn sort_newest_first(index: &mut [BackupSummary]) {
    index.sort_by(|a, b| b.creation_key().cmp(&a.creation_key()));
}

/// Returns one page of the index, newest first.
pub fn paginate(index: &[BackupSummary], limit: usize, offset: usize) -> Vec<BackupSummary> {
    let mut sorted = index.to_vec();
    sort_newest_first(&mut sorted);
    sorted.into_iter().skip(offset).take(limit).collect()
}

/// Aggregates counts and sizes over the index.
pub fn compute_stats(index: &[BackupSummary]) -> BackupStats {
    let mut by_type: BTreeMap<String, u64> = BackupType::ALL
        .iter()
        .map(|t| (t.to_string(), 0))
        .collect();
    let mut by_status: BTreeMap<String, u64> = BackupStatus::ALL
        .iter()
        .map(|s| (s.to_string(), 0))
        .collect();

    let mut total_size = 0u64;
    for summary in index {
        *by_type.entry(summary.backup_type.to_string()).or_default() += 1;
        *by_status.entry(summary.status.to_string()).or_default() += 1;
        total_size += summary.size;
    }

    let total = index.len() as u64;
    let average_size = if total == 0 { 0 } else { total_size / total };

    BackupStats {
        total,
        by_type,
        by_status,
        total_size,
        average_size,
        latest_backup_at: index.iter().map(|s| s.created_at).max(),
    }
}
