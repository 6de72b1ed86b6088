//! Set walkers for adds and swaps.
//!
//! Asserts:
//!   - each set is applied in key order
//!   - adds enroll in course then section; swaps move sections only
//!   - the first fatal error stops the walk and names its delta

use std::sync::Arc;

use roster_client::ClientError;
use roster_paper::{PaperOp, PaperRoster};
use roster_reconcile::{
    DiffResult, EnrollmentKey, EnrollmentRecord, SectionChange, Snapshot,
};
use roster_runtime::{ApplyEngine, ApplyReport, CancellationToken, ErrorKind};

fn students_for(paper: &PaperRoster, op: PaperOp) -> Vec<String> {
    paper
        .calls()
        .into_iter()
        .filter(|c| c.op == op)
        .filter_map(|c| c.student.map(|s| s.to_string()))
        .collect()
}

#[tokio::test]
async fn adds_run_in_key_order() {
    let paper = Arc::new(PaperRoster::new());
    let engine = ApplyEngine::new(paper.as_ref(), CancellationToken::new());
    let mut diff = DiffResult::default();
    diff.adds
        .insert(EnrollmentKey::new("1002", 2110, "COMP2012"), "LA3".into());
    diff.adds
        .insert(EnrollmentKey::new("1001", 2110, "COMP2011"), "LA1".into());

    let mut report = ApplyReport::default();
    engine.apply_adds(&diff.adds, &mut report).await.unwrap();

    assert_eq!(report.adds_applied, 2);
    assert_eq!(students_for(&paper, PaperOp::EnrollInCourse), vec!["1001", "1002"]);
    assert_eq!(students_for(&paper, PaperOp::EnrollInSection), vec!["1001", "1002"]);
    assert_eq!(paper.course_memberships().len(), 2);
    assert!(report.discrepancies.is_empty());
}

#[tokio::test]
async fn swaps_run_in_key_order_and_keep_course_membership() {
    let paper = Arc::new(PaperRoster::with_snapshot(&Snapshot::new(vec![
        EnrollmentRecord::new("1002", 2110, "COMP2011", "LA2"),
        EnrollmentRecord::new("1001", 2110, "COMP2011", "LA1"),
    ])));
    let engine = ApplyEngine::new(paper.as_ref(), CancellationToken::new());
    let mut diff = DiffResult::default();
    for (sid, from, to) in [("1002", "LA2", "LA1"), ("1001", "LA1", "LA3")] {
        diff.swaps.insert(
            EnrollmentKey::new(sid, 2110, "COMP2011"),
            SectionChange {
                old_section: from.into(),
                new_section: to.into(),
            },
        );
    }

    let mut report = ApplyReport::default();
    engine.apply_swaps(&diff.swaps, &mut report).await.unwrap();

    assert_eq!(report.swaps_applied, 2);
    assert_eq!(students_for(&paper, PaperOp::RemoveFromSection), vec!["1001", "1002"]);
    assert!(students_for(&paper, PaperOp::RemoveFromCourse).is_empty());
    assert_eq!(
        paper.snapshot().sorted(),
        Snapshot::new(vec![
            EnrollmentRecord::new("1001", 2110, "COMP2011", "LA3"),
            EnrollmentRecord::new("1002", 2110, "COMP2011", "LA1"),
        ])
    );
    assert_eq!(paper.course_memberships().len(), 2);
}

#[tokio::test]
async fn add_walk_stops_at_first_fatal_error() {
    let paper = Arc::new(PaperRoster::new());
    paper.fail_for_student(
        PaperOp::EnrollInCourse,
        "1001",
        ClientError::Transport("connection reset".into()),
    );
    let engine = ApplyEngine::new(paper.as_ref(), CancellationToken::new());
    let mut diff = DiffResult::default();
    diff.adds
        .insert(EnrollmentKey::new("1001", 2110, "COMP2011"), "LA1".into());
    diff.adds
        .insert(EnrollmentKey::new("1002", 2110, "COMP2011"), "LA1".into());

    let mut report = ApplyReport::default();
    let failure = engine.apply_adds(&diff.adds, &mut report).await.unwrap_err();

    assert!(matches!(failure.kind, ErrorKind::Transport(_)));
    assert_eq!(failure.delta.key(), &EnrollmentKey::new("1001", 2110, "COMP2011"));
    assert_eq!(report.adds_applied, 0);
    assert!(students_for(&paper, PaperOp::EnrollInCourse)
        .iter()
        .all(|s| s == "1001"));
}
