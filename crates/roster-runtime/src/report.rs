use std::fmt;

use chrono::{DateTime, Utc};
use roster_reconcile::{EnrollmentKey, SemesterId, StudentId};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// Remote mutation whose affected-row count is checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    RemoveFromSection,
    RemoveFromCourse,
    EnrollInCourse,
    EnrollInSection,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::RemoveFromSection => "remove_from_section",
            Operation::RemoveFromCourse => "remove_from_course",
            Operation::EnrollInCourse => "enroll_in_course",
            Operation::EnrollInSection => "enroll_in_section",
        })
    }
}

/// Affected-row count differed from what the mutation should have touched.
/// Never fatal; kept for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub operation: Operation,
    pub student_id: StudentId,
    pub semester: SemesterId,
    pub course: String,
    pub section: String,
    pub expected: u64,
    pub actual: u64,
}

/// Per-run tally of the apply phase.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub drops_applied: usize,
    pub adds_applied: usize,
    pub swaps_applied: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ApplyReport {
    pub fn deltas_applied(&self) -> usize {
        self.drops_applied + self.adds_applied + self.swaps_applied
    }

    /// Compare `actual` with `expected` and log + keep a discrepancy on mismatch.
    pub fn observe(
        &mut self,
        operation: Operation,
        key: &EnrollmentKey,
        section: &str,
        expected: u64,
        actual: u64,
    ) {
        if actual == expected {
            return;
        }
        let d = Discrepancy {
            operation,
            student_id: key.student_id.clone(),
            semester: key.semester,
            course: key.course.clone(),
            section: section.to_string(),
            expected,
            actual,
        };
        warn!(
            operation = %d.operation,
            student = %d.student_id,
            semester = %d.semester,
            course = %d.course,
            section = %d.section,
            expected = d.expected,
            actual = d.actual,
            "affected-row discrepancy"
        );
        self.discrepancies.push(d);
    }

    pub fn merge(&mut self, other: ApplyReport) {
        self.drops_applied += other.drops_applied;
        self.adds_applied += other.adds_applied;
        self.swaps_applied += other.swaps_applied;
        self.discrepancies.extend(other.discrepancies);
    }
}

/// Everything a completed run observed. Internal; `reconcile` only reports success.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub semester: SemesterId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub old_records: usize,
    pub new_records: usize,
    pub drops: usize,
    pub adds: usize,
    pub swaps: usize,
    pub unchanged: usize,
    pub apply: ApplyReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_counts_are_not_recorded() {
        let key = EnrollmentKey::new("s1", 2110, "COMP2011");
        let mut r = ApplyReport::default();
        r.observe(Operation::EnrollInCourse, &key, "LA1", 1, 1);
        assert!(r.discrepancies.is_empty());
        r.observe(Operation::RemoveFromSection, &key, "LA1", 1, 0);
        assert_eq!(r.discrepancies.len(), 1);
        assert_eq!(r.discrepancies[0].actual, 0);
        assert_eq!(r.discrepancies[0].course, "COMP2011");
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = ApplyReport {
            drops_applied: 1,
            ..Default::default()
        };
        let b = ApplyReport {
            adds_applied: 2,
            swaps_applied: 1,
            ..Default::default()
        };
        a.merge(b);
        assert_eq!(a.deltas_applied(), 4);
    }
}
