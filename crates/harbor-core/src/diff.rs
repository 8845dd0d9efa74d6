//! # Incremental Diffing
//!
//! Computes incremental content against a base state and rebuilds the
//! state a backup chain represents.
//!
//! ## Chain Materialization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Full (bk_1)        Incremental (bk_2)     Incremental (bk_3)          │
//! │   {a:1, b:2}    ──►  {b:3, c:4}        ──►  {d:5}  deleted:[a]          │
//! │                                                                         │
//! │   state after bk_1:  {a:1, b:2}                                         │
//! │   state after bk_2:  {a:1, b:3, c:4}                                    │
//! │   state after bk_3:  {b:3, c:4, d:5}                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! An incremental backup's content is exactly the keys whose value differs
//! from the base state or that are new. Keys that disappeared are recorded
//! separately as `deleted_keys` and never appear in the content.

use crate::error::{CoreError, CoreResult};
use crate::types::{BackupRecord, BackupSummary, BackupType, ContentMap};

/// Result of comparing the current store against a base state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDiff {
    /// Changed or new keys with their current values.
    pub changed: ContentMap,
    /// Keys in the base state that are absent now.
    pub deleted: Vec<String>,
}

/// Compares `current` against `base`.
pub fn diff_content(base: &ContentMap, current: &ContentMap) -> ContentDiff {
    let changed = current
        .iter()
        .filter(|(key, value)| base.get(*key) != Some(*value))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let deleted = base
        .keys()
        .filter(|key| !current.contains_key(*key))
        .cloned()
        .collect();

    ContentDiff { changed, deleted }
}

/// Returns the most recent completed backup that can serve as a base.
pub fn latest_base(index: &[BackupSummary]) -> Option<&BackupSummary> {
    index
        .iter()
        .filter(|s| s.is_completed() && s.backup_type.can_be_base())
        .max_by_key(|s| s.creation_key())
}

/// Resolves the ids of the chain ending at `base_id`, oldest first.
///
/// The chain starts at the nearest full backup reached by following
/// `base_backup_id` links.
pub fn resolve_chain(index: &[BackupSummary], base_id: &str) -> CoreResult<Vec<String>> {
    let mut chain = Vec::new();
    let mut current = base_id.to_string();
    let mut from = base_id.to_string();

    loop {
        let summary = index
            .iter()
            .find(|s| s.id == current && s.is_completed())
            .ok_or_else(|| CoreError::BrokenChain {
                backup_id: from.clone(),
                missing: current.clone(),
            })?;

        chain.push(summary.id.clone());

        match summary.backup_type {
            BackupType::Full => break,
            BackupType::Incremental => match &summary.base_backup_id {
                Some(parent) => {
                    from = current;
                    current = parent.clone();
                }
                None => {
                    return Err(CoreError::BrokenChain {
                        backup_id: summary.id.clone(),
                        missing: "<none>".to_string(),
                    })
                }
            },
            BackupType::Selective => {
                return Err(CoreError::BrokenChain {
                    backup_id: from,
                    missing: summary.id.clone(),
                })
            }
        }

        // A cycle can only come from a corrupted index.
        if chain.len() > index.len() {
            return Err(CoreError::BrokenChain {
                backup_id: base_id.to_string(),
                missing: current,
            });
        }
    }

    chain.reverse();
    Ok(chain)
}

/// Replays a chain (oldest first) into the state it represents.
pub fn materialize<'a>(chain: impl IntoIterator<Item = &'a BackupRecord>) -> ContentMap {
    let mut state = ContentMap::new();

    for record in chain {
        match record.backup_type() {
            BackupType::Full => {
                state = record.content.clone();
            }
            BackupType::Incremental => {
                for key in &record.deleted_keys {
                    state.remove(key);
                }
                state.extend(record.content.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            BackupType::Selective => {}
        }
    }

    state
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BackupStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn map(pairs: &[(&str, &str)]) -> ContentMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn completed(
        id: &str,
        seq: u64,
        ty: BackupType,
        base: Option<&str>,
        content: ContentMap,
        deleted: Vec<String>,
    ) -> BackupRecord {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seq as i64);
        let mut rec = BackupRecord::begin(id, seq, ty, at);
        rec.summary.base_backup_id = base.map(String::from);
        rec.complete(content, deleted, at).unwrap();
        rec
    }

    #[test]
    fn test_diff_changed_and_new_keys() {
        let base = map(&[("a", "1"), ("b", "2")]);
        let current = map(&[("a", "1"), ("b", "3"), ("c", "4")]);

        let diff = diff_content(&base, &current);

        assert_eq!(diff.changed, map(&[("b", "3"), ("c", "4")]));
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_diff_never_puts_deletions_in_content() {
        let base = map(&[("a", "1"), ("gone", "x")]);
        let current = map(&[("a", "1")]);

        let diff = diff_content(&base, &current);

        assert!(diff.changed.is_empty());
        assert_eq!(diff.deleted, vec!["gone".to_string()]);
    }

    #[test]
    fn test_diff_empty_value_differs_from_missing() {
        let diff = diff_content(&ContentMap::new(), &map(&[("k", "")]));
        assert_eq!(diff.changed, map(&[("k", "")]));
    }

    #[test]
    fn test_latest_base_skips_selective_and_failed() {
        let full = completed("bk_1", 1, BackupType::Full, None, map(&[]), vec![]);
        let selective = completed("bk_2", 2, BackupType::Selective, None, map(&[]), vec![]);
        let mut failed = BackupRecord::begin("bk_3", 3, BackupType::Full, Utc::now());
        failed.fail("boom", Utc::now()).unwrap();

        let index = vec![
            full.summary.clone(),
            selective.summary.clone(),
            failed.summary.clone(),
        ];

        assert_eq!(latest_base(&index).unwrap().id, "bk_1");
        assert!(latest_base(&[selective.summary]).is_none());
    }

    #[test]
    fn test_resolve_and_materialize_chain() {
        let full = completed("bk_1", 1, BackupType::Full, None, map(&[("a", "1"), ("b", "2")]), vec![]);
        let inc1 = completed(
            "bk_2",
            2,
            BackupType::Incremental,
            Some("bk_1"),
            map(&[("b", "3"), ("c", "4")]),
            vec![],
        );
        let inc2 = completed(
            "bk_3",
            3,
            BackupType::Incremental,
            Some("bk_2"),
            map(&[("d", "5")]),
            vec!["a".to_string()],
        );
        let index = vec![inc2.summary.clone(), full.summary.clone(), inc1.summary.clone()];

        let chain = resolve_chain(&index, "bk_3").unwrap();
        assert_eq!(chain, vec!["bk_1", "bk_2", "bk_3"]);

        let state = materialize([&full, &inc1, &inc2]);
        assert_eq!(state, map(&[("b", "3"), ("c", "4"), ("d", "5")]));
    }

    #[test]
    fn test_resolve_chain_reports_missing_base() {
        let inc = completed("bk_2", 2, BackupType::Incremental, Some("bk_1"), map(&[]), vec![]);

        let err = resolve_chain(&[inc.summary], "bk_2").unwrap_err();
        match err {
            CoreError::BrokenChain { backup_id, missing } => {
                assert_eq!(backup_id, "bk_2");
                assert_eq!(missing, "bk_1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_chain_ignores_incomplete_records() {
        let mut rec = BackupRecord::begin("bk_1", 1, BackupType::Full, Utc::now());
        rec.summary.status = BackupStatus::InProgress;

        assert!(resolve_chain(&[rec.summary], "bk_1").is_err());
    }
}
