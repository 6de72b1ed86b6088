//! Deterministic in-memory "paper" roster.
//!
//! Stands in for the remote system of record in tests and dry CLI runs.
//!
//! Design decisions:
//! - Row ids come from one monotonically increasing counter. No randomness.
//! - Finding a missing course or section creates it, like the remote does.
//! - Enrolling an existing member affects 0 rows; removing a missing row affects 0 rows.
//! - Faults are injected per operation (optionally per student) and are sticky.
//! - Every call is appended to a call log so tests can assert ordering.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use roster_client::{ClientError, CourseId, MembershipId, RosterClient, SectionId};
use roster_reconcile::{
    feed::FeedEnrollment, EnrollmentRecord, SemesterId, Snapshot, StudentId,
};
use tracing::debug;

mod state;

pub use state::{CourseRow, MemberRow, PaperState, SectionRow};

/// Remote operations, as seen by the fault injector and call log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PaperOp {
    FindOrCreateCourse,
    FindOrCreateSection,
    EnrollInCourse,
    EnrollInSection,
    RemoveFromCourse,
    RemoveFromSection,
    FindCourseMembership,
    FindSectionMembership,
    FetchOldSnapshot,
    FetchNewSnapshot,
}

impl PaperOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperOp::FindOrCreateCourse => "find_or_create_course",
            PaperOp::FindOrCreateSection => "find_or_create_section",
            PaperOp::EnrollInCourse => "enroll_in_course",
            PaperOp::EnrollInSection => "enroll_in_section",
            PaperOp::RemoveFromCourse => "remove_from_course",
            PaperOp::RemoveFromSection => "remove_from_section",
            PaperOp::FindCourseMembership => "find_course_membership",
            PaperOp::FindSectionMembership => "find_section_membership",
            PaperOp::FetchOldSnapshot => "fetch_old_snapshot",
            PaperOp::FetchNewSnapshot => "fetch_new_snapshot",
        }
    }
}

/// One logged call. `student` is set for operations that concern a student.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaperCall {
    pub op: PaperOp,
    pub student: Option<StudentId>,
}

#[derive(Clone, Debug)]
struct Fault {
    op: PaperOp,
    student: Option<StudentId>,
    error: ClientError,
}

#[derive(Debug, Default)]
struct Injected {
    faults: Vec<Fault>,
    forced_rows: Vec<(PaperOp, u64)>,
    calls: Vec<PaperCall>,
}

#[derive(Debug, Default)]
pub struct PaperRoster {
    state: Mutex<PaperState>,
    injected: Mutex<Injected>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PaperRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: PaperState) -> Self {
        Self {
            state: Mutex::new(state),
            injected: Mutex::default(),
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::from_state(serde_json::from_str(json)?))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*lock(&self.state))
    }

    /// Paper roster already holding every record of `snapshot`.
    pub fn with_snapshot(snapshot: &Snapshot) -> Self {
        let roster = Self::new();
        roster.seed(snapshot);
        roster
    }

    /// Enroll each record's student in its course and section, creating rows as needed.
    pub fn seed(&self, snapshot: &Snapshot) {
        let mut st = lock(&self.state);
        for r in snapshot.records() {
            let section_id = st.ensure_section(r.semester.0, &r.course, &r.section);
            let course_id = st.ensure_course(r.semester.0, &r.course);
            let sid = r.student_id.as_str();

            let id = st.alloc_id();
            PaperState::add_member(&mut st.course_members, id, sid, course_id);
            let id = st.alloc_id();
            PaperState::add_member(&mut st.section_members, id, sid, section_id);
        }
    }

    /// Register a login name with a fixed student id.
    pub fn with_user(self, itsc: impl Into<String>, student: impl Into<StudentId>) -> Self {
        let student: StudentId = student.into();
        lock(&self.state)
            .users
            .insert(itsc.into(), student.as_str().to_string());
        self
    }

    /// Make every matching call fail with `error`.
    pub fn fail(&self, op: PaperOp, error: ClientError) {
        lock(&self.injected).faults.push(Fault {
            op,
            student: None,
            error,
        });
    }

    /// Like [`PaperRoster::fail`], but only for calls concerning `student`.
    pub fn fail_for_student(&self, op: PaperOp, student: impl Into<StudentId>, error: ClientError) {
        lock(&self.injected).faults.push(Fault {
            op,
            student: Some(student.into()),
            error,
        });
    }

    /// Report `rows` affected for every `op` call, whatever actually happened.
    pub fn force_affected_rows(&self, op: PaperOp, rows: u64) {
        lock(&self.injected).forced_rows.push((op, rows));
    }

    pub fn calls(&self) -> Vec<PaperCall> {
        lock(&self.injected).calls.clone()
    }

    pub fn calls_for(&self, student: &StudentId) -> Vec<PaperOp> {
        lock(&self.injected)
            .calls
            .iter()
            .filter(|c| c.student.as_ref() == Some(student))
            .map(|c| c.op)
            .collect()
    }

    pub fn state(&self) -> PaperState {
        lock(&self.state).clone()
    }

    /// Current section memberships as a snapshot, without touching the call log.
    pub fn snapshot(&self) -> Snapshot {
        section_snapshot(&lock(&self.state))
    }

    /// (student, semester, course) of every course membership.
    pub fn course_memberships(&self) -> Vec<(StudentId, SemesterId, String)> {
        let st = lock(&self.state);
        st.course_members
            .iter()
            .filter_map(|m| {
                st.course_by_id(m.parent_id).map(|c| {
                    (
                        StudentId::new(m.student_id.clone()),
                        SemesterId(c.semester),
                        c.code.clone(),
                    )
                })
            })
            .collect()
    }

    fn enter(&self, op: PaperOp, student: Option<&StudentId>) -> Result<(), ClientError> {
        let mut inj = lock(&self.injected);
        inj.calls.push(PaperCall {
            op,
            student: student.cloned(),
        });
        let hit = inj.faults.iter().find(|f| {
            f.op == op && (f.student.is_none() || f.student.as_ref() == student)
        });
        match hit {
            Some(f) => {
                debug!(op = op.as_str(), error = %f.error, "paper fault injected");
                Err(f.error.clone())
            }
            None => Ok(()),
        }
    }

    fn rows(&self, op: PaperOp, actual: u64) -> u64 {
        lock(&self.injected)
            .forced_rows
            .iter()
            .rev()
            .find(|(o, _)| *o == op)
            .map(|(_, n)| *n)
            .unwrap_or(actual)
    }

    fn member_student(members: &[MemberRow], id: i64) -> Option<StudentId> {
        members
            .iter()
            .find(|m| m.id == id)
            .map(|m| StudentId::new(m.student_id.clone()))
    }
}

fn section_snapshot(st: &PaperState) -> Snapshot {
    st.section_members
        .iter()
        .filter_map(|m| {
            let section = st.sections.iter().find(|s| s.id == m.parent_id)?;
            let course = st.course_by_id(section.course_id)?;
            Some(EnrollmentRecord::new(
                m.student_id.as_str(),
                course.semester,
                &course.code,
                &section.name,
            ))
        })
        .collect()
}

#[async_trait]
impl RosterClient for PaperRoster {
    fn client_name(&self) -> &'static str {
        "paper"
    }

    async fn find_or_create_course(
        &self,
        semester: SemesterId,
        course: &str,
    ) -> Result<CourseId, ClientError> {
        self.enter(PaperOp::FindOrCreateCourse, None)?;
        Ok(CourseId(lock(&self.state).ensure_course(semester.0, course)))
    }

    async fn find_or_create_section(
        &self,
        semester: SemesterId,
        course: &str,
        section: &str,
    ) -> Result<SectionId, ClientError> {
        self.enter(PaperOp::FindOrCreateSection, None)?;
        Ok(SectionId(
            lock(&self.state).ensure_section(semester.0, course, section),
        ))
    }

    async fn enroll_in_course(
        &self,
        student: &StudentId,
        course: CourseId,
    ) -> Result<u64, ClientError> {
        self.enter(PaperOp::EnrollInCourse, Some(student))?;
        let mut st = lock(&self.state);
        if st.course_by_id(course.0).is_none() {
            return Err(ClientError::NotFound {
                what: format!("course {course}"),
            });
        }
        let id = st.alloc_id();
        let n = PaperState::add_member(&mut st.course_members, id, student.as_str(), course.0);
        drop(st);
        Ok(self.rows(PaperOp::EnrollInCourse, n))
    }

    async fn enroll_in_section(
        &self,
        student: &StudentId,
        section: SectionId,
    ) -> Result<u64, ClientError> {
        self.enter(PaperOp::EnrollInSection, Some(student))?;
        let mut st = lock(&self.state);
        if !st.sections.iter().any(|s| s.id == section.0) {
            return Err(ClientError::NotFound {
                what: format!("section {section}"),
            });
        }
        let id = st.alloc_id();
        let n = PaperState::add_member(&mut st.section_members, id, student.as_str(), section.0);
        drop(st);
        Ok(self.rows(PaperOp::EnrollInSection, n))
    }

    async fn remove_from_course(&self, membership: MembershipId) -> Result<u64, ClientError> {
        let student = Self::member_student(&lock(&self.state).course_members, membership.0);
        self.enter(PaperOp::RemoveFromCourse, student.as_ref())?;
        let n = PaperState::remove_member(&mut lock(&self.state).course_members, membership.0);
        Ok(self.rows(PaperOp::RemoveFromCourse, n))
    }

    async fn remove_from_section(&self, membership: MembershipId) -> Result<u64, ClientError> {
        let student = Self::member_student(&lock(&self.state).section_members, membership.0);
        self.enter(PaperOp::RemoveFromSection, student.as_ref())?;
        let n = PaperState::remove_member(&mut lock(&self.state).section_members, membership.0);
        Ok(self.rows(PaperOp::RemoveFromSection, n))
    }

    async fn find_course_membership(
        &self,
        student: &StudentId,
        course: CourseId,
    ) -> Result<Option<MembershipId>, ClientError> {
        self.enter(PaperOp::FindCourseMembership, Some(student))?;
        let st = lock(&self.state);
        Ok(PaperState::find_member(&st.course_members, student.as_str(), course.0).map(MembershipId))
    }

    async fn find_section_membership(
        &self,
        student: &StudentId,
        section: SectionId,
    ) -> Result<Option<MembershipId>, ClientError> {
        self.enter(PaperOp::FindSectionMembership, Some(student))?;
        let st = lock(&self.state);
        Ok(PaperState::find_member(&st.section_members, student.as_str(), section.0).map(MembershipId))
    }

    async fn fetch_old_snapshot(&self) -> Result<Snapshot, ClientError> {
        self.enter(PaperOp::FetchOldSnapshot, None)?;
        Ok(self.snapshot())
    }

    async fn fetch_new_snapshot(
        &self,
        semester: SemesterId,
        feed: &[FeedEnrollment],
    ) -> Result<Snapshot, ClientError> {
        self.enter(PaperOp::FetchNewSnapshot, None)?;
        let mut st = lock(&self.state);
        st.semesters.insert(semester.0);

        let mut snapshot = Snapshot::empty();
        for row in feed {
            let sid = match st.users.get(&row.itsc) {
                Some(id) => id.clone(),
                None => {
                    let id = st.alloc_id().to_string();
                    debug!(itsc = %row.itsc, student = %id, "paper user registered");
                    st.users.insert(row.itsc.clone(), id.clone());
                    id
                }
            };
            snapshot.push(EnrollmentRecord::new(
                sid.as_str(),
                semester.0,
                &row.course,
                &row.section,
            ));
        }
        Ok(snapshot)
    }
}
