//! roster-reconcile
//!
//! Enrollment reconciliation core.
//!
//! Architectural decisions:
//! - Snapshots are keyed by (student, semester, course); the section is the value
//! - Only sections accepted by the [`SectionFilter`] take part in a diff
//! - Remaining populations must match after drops/adds are removed, or the diff fails
//! - Delta sets are ordered maps, so every derived iteration is reproducible
//!
//! Deterministic, pure logic. No IO. No remote calls.

mod diff;
mod filter;
mod types;

pub mod feed;
pub mod key;
pub mod semester;

pub use diff::{diff, swaps_from_remaining, DiffError, SnapshotSide};
pub use filter::SectionFilter;
pub use key::{parse_key_string, to_key, to_key_string, KeyCodecError};
pub use semester::{Season, SemesterInfo};
pub use types::*;
