//! roster-runtime
//!
//! Drives a reconciliation run against a [`roster_client::RosterClient`]:
//! fetch both snapshots, diff them, then apply the deltas.
//!
//! Guarantees:
//! - `reconcile` returns only after every scheduled delta was attempted
//! - A student's deltas run drop → add → swap, never concurrently
//! - Fatal errors carry the semester, stage and delta in progress
//! - Nothing is rolled back; the remote is the record of partial progress

mod apply;
mod error;
mod plan;
mod report;
mod run;

pub use apply::{ApplyEngine, ApplyFailure};
pub use error::{ErrorKind, ReconcileError, Stage};
pub use plan::{plan_by_student, StudentPlan};
pub use report::{ApplyReport, Discrepancy, Operation, RunReport};
pub use run::{reconcile, ReconcileOptions, ReconcilePlan, Reconciler};

pub use tokio_util::sync::CancellationToken;
