use std::fs;

use anyhow::{Context, Result};
use roster_config::ConfigMode;
use roster_paper::PaperRoster;
use roster_reconcile::{feed::FeedEnrollment, SemesterId};
use roster_runtime::{CancellationToken, ReconcileOptions, Reconciler, RunReport};
use tracing::{info, warn};

use super::{prepare, Prepared, RunArgs};

fn reconciler(p: &Prepared) -> Reconciler {
    let options = ReconcileOptions {
        filter: p.config.section_filter(),
        max_concurrent_students: p.config.reconcile.max_concurrent_students,
    };
    Reconciler::new(p.client.clone(), options)
}

/// Cancel `token` on Ctrl-C. Deltas already applied stay applied.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping before the next delta");
            token.cancel();
        }
    });
}

/// Run, then save the paper roster even when the run failed or was cancelled.
/// Deltas applied before the failure are part of the saved state.
async fn run_and_save(
    reconciler: &Reconciler,
    semester: SemesterId,
    feed: &[FeedEnrollment],
    paper: Option<&PaperRoster>,
    save_to: Option<&str>,
) -> Result<RunReport> {
    let result = reconciler.run(semester, feed).await;

    if let (Some(paper), Some(path)) = (paper, save_to) {
        fs::write(path, paper.to_json()?)
            .with_context(|| format!("write paper state failed: {path}"))?;
        info!(path, ok = result.is_ok(), "paper state saved");
    }
    Ok(result?)
}

pub async fn run_sync(args: RunArgs, save_paper_state: Option<String>) -> Result<()> {
    let prepared = prepare(&args, ConfigMode::Sync)?;
    let semester = prepared.config.semester(args.semester)?;

    let reconciler = reconciler(&prepared);
    cancel_on_ctrl_c(reconciler.cancel_token());

    let report = run_and_save(
        &reconciler,
        semester,
        &prepared.feed,
        prepared.paper.as_deref(),
        save_paper_state.as_deref(),
    )
    .await?;

    println!("run_id={}", report.run_id);
    println!("semester={}", report.semester);
    println!("config_hash={}", prepared.loaded.config_hash);
    println!("started_at_utc={}", report.started_at.to_rfc3339());
    println!(
        "drops={} adds={} swaps={} unchanged={}",
        report.drops, report.adds, report.swaps, report.unchanged
    );
    println!("applied={}", report.apply.deltas_applied());
    println!("discrepancies={}", report.apply.discrepancies.len());
    for d in &report.apply.discrepancies {
        println!(
            "discrepancy op={} student={} semester={} course={} section={} expected={} actual={}",
            d.operation, d.student_id, d.semester, d.course, d.section, d.expected, d.actual
        );
    }
    Ok(())
}

pub async fn run_plan(args: RunArgs) -> Result<()> {
    let prepared = prepare(&args, ConfigMode::Plan)?;
    let semester = prepared.config.semester(args.semester)?;

    let plan = reconciler(&prepared).plan(semester, &prepared.feed).await?;

    println!("semester={}", plan.semester);
    println!("config_hash={}", prepared.loaded.config_hash);
    println!("old_records={} new_records={}", plan.old.len(), plan.new.len());
    for delta in plan.diff.deltas() {
        println!("{delta}");
    }
    println!(
        "drops={} adds={} swaps={} unchanged={}",
        plan.diff.drops.len(),
        plan.diff.adds.len(),
        plan.diff.swaps.len(),
        plan.diff.unchanged
    );
    Ok(())
}
