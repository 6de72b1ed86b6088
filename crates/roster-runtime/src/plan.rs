use std::collections::BTreeMap;

use roster_reconcile::{Delta, DiffResult, StudentId};

/// Deltas for one student, in the order they must be applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudentPlan {
    pub student: StudentId,
    pub deltas: Vec<Delta>,
}

/// Group deltas by student: drops, then adds, then swaps, key order within a kind.
///
/// A student's drop and re-add of one course therefore never race.
pub fn plan_by_student(diff: &DiffResult) -> Vec<StudentPlan> {
    let mut by_student: BTreeMap<StudentId, Vec<Delta>> = BTreeMap::new();
    for delta in diff.deltas() {
        by_student
            .entry(delta.key().student_id.clone())
            .or_default()
            .push(delta);
    }
    by_student
        .into_iter()
        .map(|(student, deltas)| StudentPlan { student, deltas })
        .collect()
}
