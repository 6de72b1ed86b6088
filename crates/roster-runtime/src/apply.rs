//! Apply engine: turns deltas into remote mutations.
//!
//! Lookups and transport failures are fatal for the delta in progress.
//! Affected-row mismatches are only recorded as discrepancies.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::lock::Mutex as AsyncMutex;
use roster_client::{ClientError, CourseId, MembershipId, RosterClient, SectionId};
use roster_reconcile::{Delta, DeltaKind, EnrollmentKey, SectionChange, SemesterId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{ApplyReport, ErrorKind, Operation};

/// Delta that could not be applied, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub delta: Delta,
    pub kind: ErrorKind,
}

/// One lock per (semester, course). Remote find-or-create is a lookup
/// followed by a separate create and must not interleave for one course.
type CourseLocks = Mutex<BTreeMap<(SemesterId, String), Arc<AsyncMutex<()>>>>;

pub struct ApplyEngine<'a> {
    client: &'a dyn RosterClient,
    cancel: CancellationToken,
    course_locks: CourseLocks,
}

fn resolve<T>(r: Result<T, ClientError>) -> Result<T, ErrorKind> {
    r.map_err(ErrorKind::from_apply)
}

impl<'a> ApplyEngine<'a> {
    pub fn new(client: &'a dyn RosterClient, cancel: CancellationToken) -> Self {
        Self {
            client,
            cancel,
            course_locks: Mutex::default(),
        }
    }

    fn course_lock(&self, semester: SemesterId, course: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .course_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry((semester, course.to_string()))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn course_id(&self, semester: SemesterId, course: &str) -> Result<CourseId, ErrorKind> {
        let lock = self.course_lock(semester, course);
        let _held = lock.lock().await;
        resolve(self.client.find_or_create_course(semester, course).await)
    }

    /// Section creation may create the course too, so it takes the course lock.
    async fn section_id(
        &self,
        semester: SemesterId,
        course: &str,
        section: &str,
    ) -> Result<SectionId, ErrorKind> {
        let lock = self.course_lock(semester, course);
        let _held = lock.lock().await;
        resolve(
            self.client
                .find_or_create_section(semester, course, section)
                .await,
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply one delta. Cancellation is checked before anything is sent.
    pub async fn apply(&self, delta: &Delta, report: &mut ApplyReport) -> Result<(), ApplyFailure> {
        if self.cancel.is_cancelled() {
            return Err(ApplyFailure {
                delta: delta.clone(),
                kind: ErrorKind::Cancelled,
            });
        }

        let res = match delta {
            Delta::Drop { key, old_section } => self.apply_drop(key, old_section, report).await,
            Delta::Add { key, new_section } => self.apply_add(key, new_section, report).await,
            Delta::Swap {
                key,
                old_section,
                new_section,
            } => self.apply_swap(key, old_section, new_section, report).await,
        };
        res.map_err(|kind| ApplyFailure {
            delta: delta.clone(),
            kind,
        })?;

        match delta.kind() {
            DeltaKind::Drop => report.drops_applied += 1,
            DeltaKind::Add => report.adds_applied += 1,
            DeltaKind::Swap => report.swaps_applied += 1,
        }
        info!(delta = %delta, "delta applied");
        Ok(())
    }

    /// Remove the student from the section, then from the course.
    ///
    /// A membership row that is already gone is recorded as a discrepancy
    /// (actual 0), not a resolution error: the end state is already correct.
    pub async fn apply_drop(
        &self,
        key: &EnrollmentKey,
        old_section: &str,
        report: &mut ApplyReport,
    ) -> Result<(), ErrorKind> {
        let sem = key.semester;
        let section_id = self.section_id(sem, &key.course, old_section).await?;
        let course_id = self.course_id(sem, &key.course).await?;

        let section_member =
            resolve(self.client.find_section_membership(&key.student_id, section_id).await)?;
        let course_member =
            resolve(self.client.find_course_membership(&key.student_id, course_id).await)?;

        let n = self
            .remove(section_member, |m| self.client.remove_from_section(m), key, "section")
            .await?;
        report.observe(Operation::RemoveFromSection, key, old_section, 1, n);

        let n = self
            .remove(course_member, |m| self.client.remove_from_course(m), key, "course")
            .await?;
        report.observe(Operation::RemoveFromCourse, key, old_section, 1, n);
        Ok(())
    }

    /// Enroll the student in the course, then in the section.
    pub async fn apply_add(
        &self,
        key: &EnrollmentKey,
        new_section: &str,
        report: &mut ApplyReport,
    ) -> Result<(), ErrorKind> {
        let sem = key.semester;
        let course_id = self.course_id(sem, &key.course).await?;
        let section_id = self.section_id(sem, &key.course, new_section).await?;

        let n = resolve(self.client.enroll_in_course(&key.student_id, course_id).await)?;
        report.observe(Operation::EnrollInCourse, key, new_section, 1, n);

        let n = resolve(self.client.enroll_in_section(&key.student_id, section_id).await)?;
        report.observe(Operation::EnrollInSection, key, new_section, 1, n);
        Ok(())
    }

    /// Move the student between sections. Course membership is left alone.
    pub async fn apply_swap(
        &self,
        key: &EnrollmentKey,
        old_section: &str,
        new_section: &str,
        report: &mut ApplyReport,
    ) -> Result<(), ErrorKind> {
        let sem = key.semester;
        let old_id = self.section_id(sem, &key.course, old_section).await?;
        let new_id = self.section_id(sem, &key.course, new_section).await?;

        let member = resolve(self.client.find_section_membership(&key.student_id, old_id).await)?;
        let n = self
            .remove(member, |m| self.client.remove_from_section(m), key, "section")
            .await?;
        report.observe(Operation::RemoveFromSection, key, old_section, 1, n);

        let n = resolve(self.client.enroll_in_section(&key.student_id, new_id).await)?;
        report.observe(Operation::EnrollInSection, key, new_section, 1, n);
        Ok(())
    }

    /// Remove a membership row if there is one; a missing row counts as 0 affected.
    async fn remove<F, Fut>(
        &self,
        membership: Option<MembershipId>,
        call: F,
        key: &EnrollmentKey,
        what: &'static str,
    ) -> Result<u64, ErrorKind>
    where
        F: FnOnce(MembershipId) -> Fut,
        Fut: std::future::Future<Output = Result<u64, ClientError>>,
    {
        match membership {
            Some(m) => resolve(call(m).await),
            None => {
                debug!(%key, what, "no membership row to remove");
                Ok(0)
            }
        }
    }

    pub async fn apply_drops(
        &self,
        drops: &BTreeMap<EnrollmentKey, String>,
        report: &mut ApplyReport,
    ) -> Result<(), ApplyFailure> {
        for (key, old_section) in drops {
            let delta = Delta::Drop {
                key: key.clone(),
                old_section: old_section.clone(),
            };
            self.apply(&delta, report).await?;
        }
        Ok(())
    }

    pub async fn apply_adds(
        &self,
        adds: &BTreeMap<EnrollmentKey, String>,
        report: &mut ApplyReport,
    ) -> Result<(), ApplyFailure> {
        for (key, new_section) in adds {
            let delta = Delta::Add {
                key: key.clone(),
                new_section: new_section.clone(),
            };
            self.apply(&delta, report).await?;
        }
        Ok(())
    }

    pub async fn apply_swaps(
        &self,
        swaps: &BTreeMap<EnrollmentKey, SectionChange>,
        report: &mut ApplyReport,
    ) -> Result<(), ApplyFailure> {
        for (key, change) in swaps {
            let delta = Delta::Swap {
                key: key.clone(),
                old_section: change.old_section.clone(),
                new_section: change.new_section.clone(),
            };
            self.apply(&delta, report).await?;
        }
        Ok(())
    }
}
