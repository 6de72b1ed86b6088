//! Fetch → diff → apply, with per-student ordering and bounded concurrency.

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use roster_client::RosterClient;
use roster_reconcile::{diff, feed::FeedEnrollment, DiffResult, SectionFilter, SemesterId, Snapshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    plan_by_student, ApplyEngine, ApplyFailure, ApplyReport, ErrorKind, ReconcileError, RunReport,
    Stage, StudentPlan,
};

#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    pub filter: SectionFilter,
    /// Students applied at once. 1 means fully sequential.
    pub max_concurrent_students: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            filter: SectionFilter::labs(),
            max_concurrent_students: 1,
        }
    }
}

/// Both snapshots and the diff between them. Produced without mutating anything
/// except the semester/user upserts done by the snapshot fetch.
#[derive(Clone, Debug)]
pub struct ReconcilePlan {
    pub semester: SemesterId,
    pub old: Snapshot,
    pub new: Snapshot,
    pub diff: DiffResult,
}

pub struct Reconciler {
    client: Arc<dyn RosterClient>,
    options: ReconcileOptions,
    cancel: CancellationToken,
}

enum StudentOutcome {
    Done(ApplyReport),
    /// Stopped because another student failed.
    Halted(ApplyReport),
    Failed(ApplyReport, ApplyFailure),
}

impl Reconciler {
    pub fn new(client: Arc<dyn RosterClient>, options: ReconcileOptions) -> Self {
        Self {
            client,
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn check_cancel(&self, semester: SemesterId, stage: Stage) -> Result<(), ReconcileError> {
        if self.cancel.is_cancelled() {
            return Err(ReconcileError::new(semester, stage, ErrorKind::Cancelled));
        }
        Ok(())
    }

    /// Fetch both snapshots and diff them.
    pub async fn plan(
        &self,
        semester: SemesterId,
        feed: &[FeedEnrollment],
    ) -> Result<ReconcilePlan, ReconcileError> {
        self.check_cancel(semester, Stage::Fetch)?;
        let fetch_err = |e| ReconcileError::new(semester, Stage::Fetch, ErrorKind::Fetch(e));

        let old = self.client.fetch_old_snapshot().await.map_err(fetch_err)?;
        let new = self
            .client
            .fetch_new_snapshot(semester, feed)
            .await
            .map_err(fetch_err)?;
        info!(old = old.len(), new = new.len(), client = self.client.client_name(), "snapshots fetched");

        self.check_cancel(semester, Stage::Diff)?;
        let diff = diff(&old, &new, &self.options.filter)
            .map_err(|e| ReconcileError::new(semester, Stage::Diff, e.into()))?;

        Ok(ReconcilePlan {
            semester,
            old,
            new,
            diff,
        })
    }

    /// Apply a diff. Returns after every scheduled student has settled.
    pub async fn apply(
        &self,
        semester: SemesterId,
        diff: &DiffResult,
    ) -> Result<ApplyReport, ReconcileError> {
        let plans = plan_by_student(diff);
        let engine = ApplyEngine::new(self.client.as_ref(), self.cancel.clone());
        let halt = self.cancel.child_token();
        let width = self.options.max_concurrent_students.max(1);

        info!(students = plans.len(), deltas = diff.delta_count(), width, "applying deltas");

        let engine = &engine;
        let outcomes: Vec<StudentOutcome> = stream::iter(plans)
            .map(|plan| {
                let halt = halt.clone();
                async move { apply_student(engine, plan, &halt).await }
            })
            .buffered(width)
            .collect()
            .await;

        let mut report = ApplyReport::default();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                StudentOutcome::Done(r) | StudentOutcome::Halted(r) => report.merge(r),
                StudentOutcome::Failed(r, f) => {
                    report.merge(r);
                    failures.push(f);
                }
            }
        }

        // A real failure outranks the cancellations it may have caused.
        let first = failures
            .iter()
            .position(|f| !f.kind.is_cancelled())
            .or_else(|| (!failures.is_empty()).then_some(0));
        if let Some(i) = first {
            let f = failures.swap_remove(i);
            error!(delta = %f.delta, error = %f.kind, applied = report.deltas_applied(), "apply aborted");
            return Err(ReconcileError::apply(semester, f.delta, f.kind));
        }

        if !report.discrepancies.is_empty() {
            warn!(count = report.discrepancies.len(), "apply finished with discrepancies");
        }
        Ok(report)
    }

    /// Full run: fetch, diff and apply.
    pub async fn run(
        &self,
        semester: SemesterId,
        feed: &[FeedEnrollment],
    ) -> Result<RunReport, ReconcileError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("reconcile", %run_id, %semester);

        async move {
            info!(%started_at, feed_rows = feed.len(), "reconcile started");
            let plan = self.plan(semester, feed).await?;
            let apply = self.apply(semester, &plan.diff).await?;
            let finished_at = Utc::now();
            info!(
                applied = apply.deltas_applied(),
                discrepancies = apply.discrepancies.len(),
                elapsed_ms = (finished_at - started_at).num_milliseconds(),
                "reconcile finished"
            );
            Ok(RunReport {
                run_id,
                semester,
                started_at,
                finished_at,
                old_records: plan.old.len(),
                new_records: plan.new.len(),
                drops: plan.diff.drops.len(),
                adds: plan.diff.adds.len(),
                swaps: plan.diff.swaps.len(),
                unchanged: plan.diff.unchanged,
                apply,
            })
        }
        .instrument(span)
        .await
    }
}

async fn apply_student(
    engine: &ApplyEngine<'_>,
    plan: StudentPlan,
    halt: &CancellationToken,
) -> StudentOutcome {
    let mut report = ApplyReport::default();
    for delta in &plan.deltas {
        if halt.is_cancelled() && !engine.is_cancelled() {
            return StudentOutcome::Halted(report);
        }
        if let Err(f) = engine.apply(delta, &mut report).await {
            if !f.kind.is_cancelled() {
                halt.cancel();
            }
            return StudentOutcome::Failed(report, f);
        }
    }
    StudentOutcome::Done(report)
}

/// Reconcile `semester` against a registrar feed.
///
/// Discrepancies are logged, never returned. Any fatal error aborts the run;
/// remote changes already made stay in place.
pub async fn reconcile(
    client: Arc<dyn RosterClient>,
    semester: SemesterId,
    feed: &[FeedEnrollment],
    options: ReconcileOptions,
    cancel: CancellationToken,
) -> Result<(), ReconcileError> {
    Reconciler::new(client, options)
        .with_cancellation(cancel)
        .run(semester, feed)
        .await
        .map(|_| ())
}
