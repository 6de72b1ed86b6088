use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    DiffResult, EnrollmentKey, EnrollmentRecord, SectionChange, SectionFilter, Snapshot,
};

/// Which side of the diff a record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotSide {
    Old,
    New,
}

impl std::fmt::Display for SnapshotSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotSide::Old => f.write_str("old"),
            SnapshotSide::New => f.write_str("new"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// One snapshot places a student in two sections of the same course.
    #[error(
        "{side} snapshot has conflicting sections for {key}: '{first_section}' and '{second_section}'"
    )]
    DuplicateEnrollment {
        side: SnapshotSide,
        key: EnrollmentKey,
        first_section: String,
        second_section: String,
    },

    /// After removing drops and adds the two populations still disagree.
    #[error(
        "inconsistent data sets detected: new map has size {new_size} while old had {old_size}{}",
        unmatched.as_ref().map(|k| format!(" (unmatched key {k})")).unwrap_or_default()
    )]
    InconsistentSnapshot {
        old_size: usize,
        new_size: usize,
        unmatched: Option<EnrollmentKey>,
    },
}

type SectionMap = BTreeMap<EnrollmentKey, String>;

fn to_section_map(
    side: SnapshotSide,
    records: &[EnrollmentRecord],
    filter: &SectionFilter,
) -> Result<SectionMap, DiffError> {
    let mut map = SectionMap::new();
    for rec in records.iter().filter(|r| filter.accepts(r)) {
        let key = rec.key();
        match map.get(&key) {
            Some(existing) if *existing == rec.section => {
                debug!(%side, %key, section = %rec.section, "duplicate enrollment record ignored");
            }
            Some(existing) => {
                return Err(DiffError::DuplicateEnrollment {
                    side,
                    key,
                    first_section: existing.clone(),
                    second_section: rec.section.clone(),
                });
            }
            None => {
                map.insert(key, rec.section.clone());
            }
        }
    }
    Ok(map)
}

/// Swap stage over the populations left after drops and adds were removed.
///
/// Both maps must hold exactly the same keys; anything else means the
/// snapshots disagree beyond simple add/drop and no swap may be derived.
/// Returns the swaps plus the number of unchanged keys.
pub fn swaps_from_remaining(
    old: &BTreeMap<EnrollmentKey, String>,
    new: &BTreeMap<EnrollmentKey, String>,
) -> Result<(BTreeMap<EnrollmentKey, SectionChange>, usize), DiffError> {
    if old.len() != new.len() {
        return Err(DiffError::InconsistentSnapshot {
            old_size: old.len(),
            new_size: new.len(),
            unmatched: None,
        });
    }

    let mut swaps = BTreeMap::new();
    let mut unchanged = 0usize;
    for (key, new_section) in new {
        let Some(old_section) = old.get(key) else {
            return Err(DiffError::InconsistentSnapshot {
                old_size: old.len(),
                new_size: new.len(),
                unmatched: Some(key.clone()),
            });
        };
        if old_section == new_section {
            unchanged += 1;
        } else {
            swaps.insert(
                key.clone(),
                SectionChange {
                    old_section: old_section.clone(),
                    new_section: new_section.clone(),
                },
            );
        }
    }
    Ok((swaps, unchanged))
}

/// Compute drops, adds and swaps between an authoritative `old` snapshot and a
/// freshly observed `new` one.
///
/// - Records rejected by `filter` take no part in the diff
/// - Drops: keys only in `old`; adds: keys only in `new`
/// - Swaps: keys in both whose sections differ
pub fn diff(
    old: &Snapshot,
    new: &Snapshot,
    filter: &SectionFilter,
) -> Result<DiffResult, DiffError> {
    let old_sorted = old.clone().sorted();
    let new_sorted = new.clone().sorted();

    let mut old_map = to_section_map(SnapshotSide::Old, old_sorted.records(), filter)?;
    let mut new_map = to_section_map(SnapshotSide::New, new_sorted.records(), filter)?;

    // 1) Drops
    let drop_keys: Vec<EnrollmentKey> = old_map
        .keys()
        .filter(|k| !new_map.contains_key(*k))
        .cloned()
        .collect();
    let mut drops = BTreeMap::new();
    for key in drop_keys {
        if let Some(section) = old_map.remove(&key) {
            debug!(%key, %section, "drop");
            drops.insert(key, section);
        }
    }

    // 2) Adds
    let add_keys: Vec<EnrollmentKey> = new_map
        .keys()
        .filter(|k| !old_map.contains_key(*k))
        .cloned()
        .collect();
    let mut adds = BTreeMap::new();
    for key in add_keys {
        if let Some(section) = new_map.remove(&key) {
            debug!(%key, %section, "add");
            adds.insert(key, section);
        }
    }

    // 3) Swaps over the shared population
    let (swaps, unchanged) = swaps_from_remaining(&old_map, &new_map)?;
    for (key, change) in &swaps {
        debug!(%key, from = %change.old_section, to = %change.new_section, "swap");
    }

    info!(
        drops = drops.len(),
        adds = adds.len(),
        swaps = swaps.len(),
        unchanged,
        "enrollment diff computed"
    );

    Ok(DiffResult {
        drops,
        adds,
        swaps,
        unchanged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(sid: &str, course: &str, section: &str) -> EnrollmentRecord {
        EnrollmentRecord::new(sid, 2110, course, section)
    }

    #[test]
    fn conflicting_duplicate_rejected() {
        let old = Snapshot::new(vec![
            rec("s1", "COMP2011", "LA1"),
            rec("s1", "COMP2011", "LA2"),
        ]);
        let err = diff(&old, &Snapshot::empty(), &SectionFilter::labs()).unwrap_err();
        match err {
            DiffError::DuplicateEnrollment {
                side,
                first_section,
                second_section,
                ..
            } => {
                assert_eq!(side, SnapshotSide::Old);
                assert_eq!(first_section, "LA1");
                assert_eq!(second_section, "LA2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn identical_duplicate_tolerated() {
        let new = Snapshot::new(vec![
            rec("s1", "COMP2011", "LA1"),
            rec("s1", "comp2011", "la1"),
        ]);
        let r = diff(&Snapshot::empty(), &new, &SectionFilter::labs()).unwrap();
        assert_eq!(r.adds.len(), 1);
    }

    #[test]
    fn duplicate_outside_filter_is_ignored() {
        let old = Snapshot::new(vec![rec("s1", "COMP2011", "L1"), rec("s1", "COMP2011", "L2")]);
        let r = diff(&old, &Snapshot::empty(), &SectionFilter::labs()).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn equal_sized_but_disjoint_remaining_maps_rejected() {
        let mut old = BTreeMap::new();
        old.insert(EnrollmentKey::new("s1", 2110, "COMP2011"), "LA1".to_string());
        let mut new = BTreeMap::new();
        new.insert(EnrollmentKey::new("s2", 2110, "COMP2011"), "LA1".to_string());
        let err = swaps_from_remaining(&old, &new).unwrap_err();
        assert!(matches!(
            err,
            DiffError::InconsistentSnapshot {
                old_size: 1,
                new_size: 1,
                unmatched: Some(_)
            }
        ));
    }

    #[test]
    fn error_message_carries_both_sizes() {
        let err = DiffError::InconsistentSnapshot {
            old_size: 2,
            new_size: 1,
            unmatched: None,
        };
        assert_eq!(
            err.to_string(),
            "inconsistent data sets detected: new map has size 1 while old had 2"
        );
    }
}
