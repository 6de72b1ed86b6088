use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// System-assigned student identifier (opaque; the remote stores it as a bigint).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Untrimmed, for decoding ids that were already stored.
    pub(crate) fn verbatim(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for StudentId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Semester identifier, `YYSS` (year suffix + season code), e.g. `2110`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SemesterId(pub u32);

impl fmt::Display for SemesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One (student, semester, course, section) membership fact.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub student_id: StudentId,
    pub semester: SemesterId,
    /// Uppercase course code, e.g. `COMP2011`.
    pub course: String,
    /// Uppercase section label, e.g. `LA1`.
    pub section: String,
}

impl EnrollmentRecord {
    /// Build a record with course and section case-normalised.
    pub fn new(
        student_id: impl Into<StudentId>,
        semester: u32,
        course: impl AsRef<str>,
        section: impl AsRef<str>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            semester: SemesterId(semester),
            course: normalize_code(course.as_ref()),
            section: normalize_code(section.as_ref()),
        }
    }

    pub fn key(&self) -> EnrollmentKey {
        EnrollmentKey {
            student_id: self.student_id.clone(),
            semester: self.semester,
            course: self.course.clone(),
        }
    }
}

pub(crate) fn normalize_code(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

/// Canonical composite key of an enrollment. Two records are the same
/// enrollment iff their keys are equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnrollmentKey {
    pub student_id: StudentId,
    pub semester: SemesterId,
    pub course: String,
}

impl EnrollmentKey {
    pub fn new(student_id: impl Into<StudentId>, semester: u32, course: impl AsRef<str>) -> Self {
        Self {
            student_id: student_id.into(),
            semester: SemesterId(semester),
            course: normalize_code(course.as_ref()),
        }
    }
}

impl fmt::Display for EnrollmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::key::to_key_string(self))
    }
}

/// Point-in-time collection of enrollment records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<EnrollmentRecord>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(records: Vec<EnrollmentRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: EnrollmentRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EnrollmentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records sorted by (student id, course), then semester and section.
    pub fn sorted(mut self) -> Self {
        self.records.sort_by(|a, b| {
            a.student_id
                .cmp(&b.student_id)
                .then_with(|| a.course.cmp(&b.course))
                .then_with(|| a.semester.cmp(&b.semester))
                .then_with(|| a.section.cmp(&b.section))
        });
        self
    }

    pub fn into_records(self) -> Vec<EnrollmentRecord> {
        self.records
    }
}

impl FromIterator<EnrollmentRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = EnrollmentRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Drop,
    Add,
    Swap,
}

impl DeltaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaKind::Drop => "drop",
            DeltaKind::Add => "add",
            DeltaKind::Swap => "swap",
        }
    }
}

/// One computed change between two snapshots.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delta {
    /// Key existed only in the old snapshot.
    Drop {
        key: EnrollmentKey,
        old_section: String,
    },
    /// Key exists only in the new snapshot.
    Add {
        key: EnrollmentKey,
        new_section: String,
    },
    /// Key exists in both with differing sections.
    Swap {
        key: EnrollmentKey,
        old_section: String,
        new_section: String,
    },
}

impl Delta {
    pub fn key(&self) -> &EnrollmentKey {
        match self {
            Delta::Drop { key, .. } | Delta::Add { key, .. } | Delta::Swap { key, .. } => key,
        }
    }

    pub fn kind(&self) -> DeltaKind {
        match self {
            Delta::Drop { .. } => DeltaKind::Drop,
            Delta::Add { .. } => DeltaKind::Add,
            Delta::Swap { .. } => DeltaKind::Swap,
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Drop { key, old_section } => write!(f, "drop {key} {old_section}"),
            Delta::Add { key, new_section } => write!(f, "add {key} {new_section}"),
            Delta::Swap {
                key,
                old_section,
                new_section,
            } => write!(f, "swap {key} {old_section}->{new_section}"),
        }
    }
}

/// Section change carried by a swap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionChange {
    pub old_section: String,
    pub new_section: String,
}

/// Output of the diff engine: three disjoint delta sets plus the number of
/// keys found unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub drops: BTreeMap<EnrollmentKey, String>,
    pub adds: BTreeMap<EnrollmentKey, String>,
    pub swaps: BTreeMap<EnrollmentKey, SectionChange>,
    pub unchanged: usize,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.drops.is_empty() && self.adds.is_empty() && self.swaps.is_empty()
    }

    pub fn delta_count(&self) -> usize {
        self.drops.len() + self.adds.len() + self.swaps.len()
    }

    /// All deltas, drops first, then adds, then swaps; key order within a kind.
    pub fn deltas(&self) -> Vec<Delta> {
        let mut out = Vec::with_capacity(self.delta_count());
        out.extend(self.drops.iter().map(|(key, section)| Delta::Drop {
            key: key.clone(),
            old_section: section.clone(),
        }));
        out.extend(self.adds.iter().map(|(key, section)| Delta::Add {
            key: key.clone(),
            new_section: section.clone(),
        }));
        out.extend(self.swaps.iter().map(|(key, change)| Delta::Swap {
            key: key.clone(),
            old_section: change.old_section.clone(),
            new_section: change.new_section.clone(),
        }));
        out
    }
}
