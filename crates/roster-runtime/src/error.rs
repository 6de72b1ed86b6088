use std::fmt;

use roster_client::ClientError;
use roster_reconcile::{Delta, DiffError, SemesterId};
use serde::Serialize;
use thiserror::Error;

/// Phase of a reconciliation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Diff,
    Apply,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Diff => "diff",
            Stage::Apply => "apply",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Either snapshot could not be obtained. Nothing was mutated.
    #[error("snapshot fetch failed: {0}")]
    Fetch(#[source] ClientError),
    #[error(transparent)]
    InconsistentSnapshot(DiffError),
    #[error(transparent)]
    DuplicateEnrollment(DiffError),
    /// Course, section or membership lookup (or auto-creation) failed.
    #[error("remote resolution failed: {0}")]
    RemoteResolution(#[source] ClientError),
    #[error("remote transport failed: {0}")]
    Transport(#[source] ClientError),
    #[error("run cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Classify a client failure raised while applying a delta.
    pub fn from_apply(err: ClientError) -> Self {
        if err.is_transport() {
            ErrorKind::Transport(err)
        } else {
            ErrorKind::RemoteResolution(err)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ErrorKind::Cancelled)
    }
}

impl From<DiffError> for ErrorKind {
    fn from(err: DiffError) -> Self {
        match err {
            DiffError::InconsistentSnapshot { .. } => ErrorKind::InconsistentSnapshot(err),
            DiffError::DuplicateEnrollment { .. } => ErrorKind::DuplicateEnrollment(err),
        }
    }
}

/// Fatal outcome of a `reconcile` call, with enough context to re-run by hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "reconcile of semester {semester} failed during {stage}{}: {kind}",
    delta.as_ref().map(|d| format!(" at `{d}`")).unwrap_or_default()
)]
pub struct ReconcileError {
    pub semester: SemesterId,
    pub stage: Stage,
    /// Delta in progress; set for the apply stage only.
    pub delta: Option<Delta>,
    #[source]
    pub kind: ErrorKind,
}

impl ReconcileError {
    pub fn new(semester: SemesterId, stage: Stage, kind: ErrorKind) -> Self {
        Self {
            semester,
            stage,
            delta: None,
            kind,
        }
    }

    pub fn apply(semester: SemesterId, delta: Delta, kind: ErrorKind) -> Self {
        Self {
            semester,
            stage: Stage::Apply,
            delta: Some(delta),
            kind,
        }
    }
}
