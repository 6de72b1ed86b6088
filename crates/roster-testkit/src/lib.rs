//! Scenario harness shared by the end-to-end tests.
//!
//! Wraps a seeded [`PaperRoster`] and a [`Reconciler`] so a scenario reads as
//! seed → feed → run → assert.

use std::collections::BTreeSet;
use std::sync::Arc;

use roster_client::RosterClient;
use roster_paper::PaperRoster;
use roster_reconcile::{feed::FeedEnrollment, EnrollmentRecord, SemesterId, Snapshot, StudentId};
use roster_runtime::{ReconcileError, ReconcileOptions, Reconciler, RunReport};

/// `(student, semester, course, section)` rows as a snapshot.
pub fn snapshot(rows: &[(&str, u32, &str, &str)]) -> Snapshot {
    rows.iter()
        .map(|(s, sem, c, sec)| EnrollmentRecord::new(*s, *sem, *c, *sec))
        .collect()
}

/// `(itsc, course, section)` rows as a registrar feed.
pub fn feed(rows: &[(&str, &str, &str)]) -> Vec<FeedEnrollment> {
    rows.iter()
        .map(|(i, c, s)| FeedEnrollment::new(i, c, s))
        .collect()
}

pub struct Harness {
    pub paper: Arc<PaperRoster>,
    pub options: ReconcileOptions,
}

impl Harness {
    /// Paper roster seeded with `seed`; each `(itsc, student)` pair is a known user.
    pub fn new(seed: &Snapshot, users: &[(&str, &str)]) -> Self {
        let paper = users
            .iter()
            .fold(PaperRoster::with_snapshot(seed), |p, (itsc, sid)| {
                p.with_user(*itsc, *sid)
            });
        Self {
            paper: Arc::new(paper),
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn reconciler(&self) -> Reconciler {
        let client: Arc<dyn RosterClient> = self.paper.clone();
        Reconciler::new(client, self.options.clone())
    }

    pub async fn run(
        &self,
        semester: u32,
        feed: &[FeedEnrollment],
    ) -> Result<RunReport, ReconcileError> {
        self.reconciler().run(SemesterId(semester), feed).await
    }

    /// `(student, course, section)` of every remote membership the filter accepts.
    pub fn filtered_rows(&self) -> BTreeSet<(String, String, String)> {
        self.paper
            .snapshot()
            .records()
            .iter()
            .filter(|r| self.options.filter.accepts(r))
            .map(|r| (r.student_id.to_string(), r.course.clone(), r.section.clone()))
            .collect()
    }

    /// Student id the paper roster assigned to `itsc`.
    pub fn student(&self, itsc: &str) -> Option<StudentId> {
        self.paper.state().users.get(itsc).map(|id| StudentId::new(id.clone()))
    }
}

/// `(student, course, section)` triple for set comparisons.
pub fn row(student: &str, course: &str, section: &str) -> (String, String, String) {
    (student.to_string(), course.to_string(), section.to_string())
}
