//! roster-client
//!
//! Boundary to the remote system of record (courses, sections, users and
//! membership rows). The reconciliation runtime only ever talks to the
//! [`RosterClient`] trait; [`GraphqlRosterClient`] is the production
//! implementation over HTTP.

mod catalog;
mod graphql;
mod queries;

use std::fmt;

use async_trait::async_trait;
use roster_reconcile::{feed::FeedEnrollment, SemesterId, Snapshot, StudentId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use catalog::CourseCatalog;
pub use graphql::{GraphqlRosterClient, ADMIN_SECRET_HEADER};

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

remote_id!(
    /// Remote course row id.
    CourseId
);
remote_id!(
    /// Remote section row id.
    SectionId
);
remote_id!(
    /// Remote course-membership or section-membership row id.
    MembershipId
);

/// Errors a [`RosterClient`] implementation may return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The remote API rejected the operation.
    #[error("remote api error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Api { status: Option<u16>, message: String },
    /// A response payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// A lookup or creation that must yield a row yielded none.
    #[error("{what} not found")]
    NotFound { what: String },
    /// Missing or invalid client configuration.
    #[error("client config error: {0}")]
    Config(String),
}

impl ClientError {
    /// `true` for failures of the transport itself rather than of the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

/// Capability interface over the remote roster.
///
/// Implementations must be safe for concurrent use: the apply phase may have
/// several students' deltas in flight at once.
#[async_trait]
pub trait RosterClient: Send + Sync {
    fn client_name(&self) -> &'static str;

    /// Course id for `course` in `semester`, creating the course if none exists.
    async fn find_or_create_course(
        &self,
        semester: SemesterId,
        course: &str,
    ) -> Result<CourseId, ClientError>;

    /// Section id for `section` of `course` in `semester`, creating the course
    /// and/or section if needed.
    async fn find_or_create_section(
        &self,
        semester: SemesterId,
        course: &str,
        section: &str,
    ) -> Result<SectionId, ClientError>;

    async fn enroll_in_course(
        &self,
        student: &StudentId,
        course: CourseId,
    ) -> Result<u64, ClientError>;

    async fn enroll_in_section(
        &self,
        student: &StudentId,
        section: SectionId,
    ) -> Result<u64, ClientError>;

    async fn remove_from_course(&self, membership: MembershipId) -> Result<u64, ClientError>;

    async fn remove_from_section(&self, membership: MembershipId) -> Result<u64, ClientError>;

    async fn find_course_membership(
        &self,
        student: &StudentId,
        course: CourseId,
    ) -> Result<Option<MembershipId>, ClientError>;

    async fn find_section_membership(
        &self,
        student: &StudentId,
        section: SectionId,
    ) -> Result<Option<MembershipId>, ClientError>;

    /// Every section membership currently stored remotely.
    async fn fetch_old_snapshot(&self) -> Result<Snapshot, ClientError>;

    /// Snapshot built from a registrar feed for `semester`.
    ///
    /// Side effects: the semester row is upserted and feed login names with
    /// no remote user are registered.
    async fn fetch_new_snapshot(
        &self,
        semester: SemesterId,
        feed: &[FeedEnrollment],
    ) -> Result<Snapshot, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_status_when_known() {
        let e = ClientError::Api {
            status: Some(400),
            message: "field 'x' not found".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "remote api error (status 400): field 'x' not found"
        );
        let e = ClientError::Api {
            status: None,
            message: "boom".to_string(),
        };
        assert_eq!(e.to_string(), "remote api error: boom");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&CourseId(12)).unwrap(), "12");
        assert_eq!(SectionId(3).to_string(), "3");
    }
}
