//! Property checks over a small family of hand-built snapshots.

use std::collections::BTreeSet;

use roster_reconcile::*;

fn rec(sid: &str, sem: u32, course: &str, section: &str) -> EnrollmentRecord {
    EnrollmentRecord::new(sid, sem, course, section)
}

fn fixtures() -> Vec<Snapshot> {
    vec![
        Snapshot::empty(),
        Snapshot::new(vec![rec("s1", 2110, "COMP2011", "LA1")]),
        Snapshot::new(vec![
            rec("s1", 2110, "COMP2011", "LA2"),
            rec("s1", 2110, "COMP2012", "LA1"),
            rec("s2", 2110, "COMP2011", "LA1"),
            rec("s2", 2110, "COMP2011", "L1"),
        ]),
        Snapshot::new(vec![
            rec("s1", 2110, "COMP2011", "LA1"),
            rec("s2", 2110, "COMP2011", "LA3"),
            rec("s3", 2120, "COMP2011", "LA1"),
            rec("s3", 2110, "COMP2011", "L2"),
        ]),
        Snapshot::new(vec![
            rec("s3", 2120, "COMP2011", "LA4"),
            rec("s4", 2110, "COMP3111", "LA1"),
        ]),
    ]
}

fn filtered_keys(s: &Snapshot, f: &SectionFilter) -> BTreeSet<EnrollmentKey> {
    s.records()
        .iter()
        .filter(|r| f.accepts(r))
        .map(|r| r.key())
        .collect()
}

#[test]
fn diff_of_snapshot_with_itself_is_empty() {
    let f = SectionFilter::labs();
    for s in fixtures() {
        let r = diff(&s, &s, &f).unwrap();
        assert!(r.is_empty(), "diff(S, S) must be empty, got {r:?}");
        assert_eq!(r.unchanged, filtered_keys(&s, &f).len());
    }
}

#[test]
fn every_key_lands_in_exactly_one_bucket() {
    let f = SectionFilter::labs();
    for old in fixtures() {
        for new in fixtures() {
            let r = diff(&old, &new, &f).unwrap();
            let all: BTreeSet<EnrollmentKey> = filtered_keys(&old, &f)
                .union(&filtered_keys(&new, &f))
                .cloned()
                .collect();

            let mut seen = BTreeSet::new();
            for k in r.drops.keys().chain(r.adds.keys()).chain(r.swaps.keys()) {
                assert!(seen.insert(k.clone()), "key {k} double-counted");
            }
            assert_eq!(seen.len() + r.unchanged, all.len());
            assert!(seen.is_subset(&all));
        }
    }
}

#[test]
fn swaps_are_symmetric() {
    let f = SectionFilter::labs();
    for a in fixtures() {
        for b in fixtures() {
            let ab = diff(&a, &b, &f).unwrap();
            let ba = diff(&b, &a, &f).unwrap();
            assert_eq!(ab.swaps.len(), ba.swaps.len());
            for (k, change) in &ab.swaps {
                let back = &ba.swaps[k];
                assert_eq!(back.old_section, change.new_section);
                assert_eq!(back.new_section, change.old_section);
            }
            // Drops and adds trade places.
            assert_eq!(ab.drops, ba.adds);
            assert_eq!(ab.adds, ba.drops);
        }
    }
}

#[test]
fn filtered_out_records_never_produce_deltas() {
    let old = Snapshot::new(vec![
        rec("s1", 2110, "COMP2011", "L1"),
        rec("s2", 2110, "COMP2011", "T1"),
    ]);
    let new = Snapshot::new(vec![
        rec("s1", 2110, "COMP2011", "L2"),
        rec("s3", 2110, "COMP2011", "T2"),
    ]);
    let r = diff(&old, &new, &SectionFilter::labs()).unwrap();
    assert!(r.is_empty());
    assert_eq!(r.unchanged, 0);
}

#[test]
fn moving_out_of_the_filter_looks_like_a_drop() {
    // LA1 -> L1: the new record is invisible, so only the old lab membership counts.
    let old = Snapshot::new(vec![rec("s1", 2110, "COMP2011", "LA1")]);
    let new = Snapshot::new(vec![rec("s1", 2110, "COMP2011", "L1")]);
    let r = diff(&old, &new, &SectionFilter::labs()).unwrap();
    assert_eq!(r.drops.len(), 1);
    assert!(r.swaps.is_empty());
}

#[test]
fn semester_is_part_of_the_key() {
    let old = Snapshot::new(vec![rec("s1", 2110, "COMP2011", "LA1")]);
    let new = Snapshot::new(vec![rec("s1", 2120, "COMP2011", "LA1")]);
    let r = diff(&old, &new, &SectionFilter::labs()).unwrap();
    assert_eq!(r.drops.len(), 1);
    assert_eq!(r.adds.len(), 1);
}
