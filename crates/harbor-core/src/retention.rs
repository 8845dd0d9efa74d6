//! # Retention Planning
//!
//! Decides which backups to evict once the index grows past `max_backups`.
//! Newest backups are kept; backups still `InProgress` are never evicted.

use crate::types::{BackupStatus, BackupSummary};

/// Returns the ids to delete so that at most `max_backups` remain.
///
/// ## Rules
/// - Order is by creation (`created_at`, then `sequence`), newest kept
/// - `InProgress` backups are never selected, even when over the cap
pub fn plan_cleanup(index: &[BackupSummary], max_backups: usize) -> Vec<String> {
    if index.len() <= max_backups {
        return Vec::new();
    }

    let mut ordered: Vec<&BackupSummary> = index.iter().collect();
    ordered.sort_by(|a, b| b.creation_key().cmp(&a.creation_key()));

    ordered
        .into_iter()
        .skip(max_backups)
        .filter(|s| s.status != BackupStatus::InProgress)
        .map(|s| s.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackupRecord, BackupType, ContentMap};
    use chrono::{Duration, TimeZone, Utc};

    fn summaries(n: u64) -> Vec<BackupSummary> {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        (1..=n)
            .map(|i| {
                let mut rec = BackupRecord::begin(
                    format!("bk_{i}"),
                    i,
                    BackupType::Full,
                    start + Duration::minutes(i as i64),
                );
                rec.complete(ContentMap::new(), vec![], start).unwrap();
                rec.summary
            })
            .collect()
    }

    #[test]
    fn test_under_cap_deletes_nothing() {
        assert!(plan_cleanup(&summaries(3), 3).is_empty());
        assert!(plan_cleanup(&summaries(2), 100).is_empty());
    }

    #[test]
    fn test_keeps_most_recent() {
        let mut index = summaries(5);
        index.reverse(); // storage order must not matter

        let mut deleted = plan_cleanup(&index, 2);
        deleted.sort();

        assert_eq!(deleted, vec!["bk_1", "bk_2", "bk_3"]);
    }

    #[test]
    fn test_sequence_breaks_timestamp_ties() {
        let mut index = summaries(3);
        let at = index[0].created_at;
        for s in &mut index {
            s.created_at = at;
        }

        assert_eq!(plan_cleanup(&index, 1).len(), 2);
        assert!(!plan_cleanup(&index, 1).contains(&"bk_3".to_string()));
    }

    #[test]
    fn test_never_evicts_in_progress() {
        let mut index = summaries(4);
        index[0].status = BackupStatus::InProgress;

        let deleted = plan_cleanup(&index, 2);

        assert_eq!(deleted, vec!["bk_2"]);
    }
}
