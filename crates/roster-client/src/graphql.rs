use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use roster_reconcile::{
    feed::{distinct_itscs, FeedEnrollment},
    EnrollmentRecord, SemesterId, SemesterInfo, Snapshot, StudentId,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{queries, ClientError, CourseCatalog, CourseId, MembershipId, RosterClient, SectionId};

/// Header carrying the admin secret on every request.
pub const ADMIN_SECRET_HEADER: &str = "X-Hasura-Admin-Secret";

/// [`RosterClient`] over a GraphQL endpoint.
///
/// The admin secret is passed in by the caller (resolved from the environment
/// by roster-config); it is never logged.
#[derive(Clone)]
pub struct GraphqlRosterClient {
    http: reqwest::Client,
    endpoint: String,
    admin_secret: Option<String>,
    catalog: Option<CourseCatalog>,
}

impl std::fmt::Debug for GraphqlRosterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlRosterClient")
            .field("endpoint", &self.endpoint)
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<REDACTED>"))
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct AffectedRows {
    affected_rows: u64,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: i64,
    itsc: String,
}

impl GraphqlRosterClient {
    pub fn new(endpoint: impl Into<String>, admin_secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            admin_secret,
            catalog: None,
        }
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        admin_secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            admin_secret,
            catalog: None,
        })
    }

    /// Look course titles up in `url` when courses are auto-created.
    pub fn with_catalog(mut self, url: impl Into<String>) -> Self {
        self.catalog = Some(CourseCatalog::new(self.http.clone(), url));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        op: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T, ClientError> {
        let mut req = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(secret) = &self.admin_secret {
            req = req.header(ADMIN_SECRET_HEADER, secret);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("{op}: {e}")))?;
        let status = resp.status();
        let body: GraphqlResponse<T> = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("{op}: {e}")))?;

        if !body.errors.is_empty() {
            let message = body
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ClientError::Api {
                status: Some(status.as_u16()),
                message: format!("{op}: {message}"),
            });
        }
        if !status.is_success() {
            return Err(ClientError::Api {
                status: Some(status.as_u16()),
                message: format!("{op}: http error"),
            });
        }
        body.data
            .ok_or_else(|| ClientError::Decode(format!("{op}: response has no data")))
    }

    async fn find_course(
        &self,
        semester: SemesterId,
        course: &str,
    ) -> Result<Option<CourseId>, ClientError> {
        #[derive(Deserialize)]
        struct Data {
            courses: Vec<IdRow>,
        }
        let data: Data = self
            .execute(
                "findCourse",
                queries::FIND_COURSE,
                json!({ "semesterId": semester.0, "code": course }),
            )
            .await?;
        Ok(data.courses.first().map(|r| CourseId(r.id)))
    }

    async fn find_section(
        &self,
        semester: SemesterId,
        course: &str,
        section: &str,
    ) -> Result<Option<SectionId>, ClientError> {
        #[derive(Deserialize)]
        struct Data {
            sections: Vec<IdRow>,
        }
        let data: Data = self
            .execute(
                "findSection",
                queries::FIND_SECTION,
                json!({ "semesterId": semester.0, "code": course, "name": section }),
            )
            .await?;
        Ok(data.sections.first().map(|r| SectionId(r.id)))
    }

    async fn ensure_semester(&self, semester: SemesterId) -> Result<(), ClientError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "createSemester")]
            create_semester: Stamps,
        }
        #[derive(Deserialize)]
        struct Stamps {
            #[serde(rename = "createdAt")]
            created_at: String,
            #[serde(rename = "updatedAt")]
            updated_at: String,
        }

        let info = SemesterInfo::from_id(semester);
        let data: Data = self
            .execute(
                "upsertSemester",
                queries::UPSERT_SEMESTER,
                json!({ "id": semester.0, "name": info.name, "year": info.year }),
            )
            .await?;
        if data.create_semester.created_at == data.create_semester.updated_at {
            info!(semester = %semester, name = %info.name, "added new semester");
        } else {
            debug!(semester = %semester, "semester already present");
        }
        Ok(())
    }

    /// Map feed login names to user ids, registering unknown users.
    async fn resolve_users(&self, itscs: &[String]) -> Result<BTreeMap<String, StudentId>, ClientError> {
        #[derive(Deserialize)]
        struct Found {
            users: Vec<UserRow>,
        }
        #[derive(Deserialize)]
        struct Created {
            #[serde(rename = "batchCreateUser")]
            batch_create_user: Returning,
        }
        #[derive(Deserialize)]
        struct Returning {
            affected_rows: u64,
            returning: Vec<UserRow>,
        }

        let mut ids = BTreeMap::new();
        if itscs.is_empty() {
            return Ok(ids);
        }

        let found: Found = self
            .execute(
                "findUsersByItsc",
                queries::FIND_USERS_BY_ITSC,
                json!({ "itscs": itscs }),
            )
            .await?;
        for u in found.users {
            ids.insert(u.itsc, StudentId::new(u.id.to_string()));
        }

        let missing: Vec<&String> = itscs.iter().filter(|i| !ids.contains_key(*i)).collect();
        if !missing.is_empty() {
            let users: Vec<Value> = missing.iter().map(|i| json!({ "itsc": i })).collect();
            let created: Created = self
                .execute(
                    "createUsers",
                    queries::CREATE_USERS,
                    json!({ "users": users }),
                )
                .await?;
            info!(
                count = created.batch_create_user.affected_rows,
                "registered new users from registrar feed"
            );
            for u in created.batch_create_user.returning {
                ids.insert(u.itsc, StudentId::new(u.id.to_string()));
            }
        }
        Ok(ids)
    }
}

async fn affected(
    client: &GraphqlRosterClient,
    op: &'static str,
    query: &str,
    field: &'static str,
    variables: Value,
) -> Result<u64, ClientError> {
    let mut data: BTreeMap<String, AffectedRows> = client.execute(op, query, variables).await?;
    data.remove(field)
        .map(|r| r.affected_rows)
        .ok_or_else(|| ClientError::Decode(format!("{op}: missing field {field}")))
}

fn first_membership(data: &BTreeMap<String, Vec<IdRow>>, field: &str) -> Option<MembershipId> {
    data.get(field)
        .and_then(|rows| rows.first())
        .map(|r| MembershipId(r.id))
}

#[async_trait]
impl RosterClient for GraphqlRosterClient {
    fn client_name(&self) -> &'static str {
        "graphql"
    }

    async fn find_or_create_course(
        &self,
        semester: SemesterId,
        course: &str,
    ) -> Result<CourseId, ClientError> {
        if let Some(id) = self.find_course(semester, course).await? {
            return Ok(id);
        }

        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "createCourse")]
            create_course: Option<IdRow>,
        }
        let name = match &self.catalog {
            Some(catalog) => catalog.title_or_code(course).await,
            None => course.to_string(),
        };
        let data: Data = self
            .execute(
                "createCourse",
                queries::CREATE_COURSE,
                json!({ "semesterId": semester.0, "code": course, "name": name }),
            )
            .await?;
        let id = data
            .create_course
            .map(|r| CourseId(r.id))
            .ok_or_else(|| ClientError::NotFound {
                what: format!("created course {course} in semester {semester}"),
            })?;
        info!(course, semester = %semester, course_id = %id, "added course");
        Ok(id)
    }

    async fn find_or_create_section(
        &self,
        semester: SemesterId,
        course: &str,
        section: &str,
    ) -> Result<SectionId, ClientError> {
        if let Some(id) = self.find_section(semester, course, section).await? {
            return Ok(id);
        }

        let course_id = self.find_or_create_course(semester, course).await?;

        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "createSection")]
            create_section: Option<IdRow>,
        }
        let data: Data = self
            .execute(
                "createSection",
                queries::CREATE_SECTION,
                json!({ "courseId": course_id.0, "name": section }),
            )
            .await?;
        let id = data
            .create_section
            .map(|r| SectionId(r.id))
            .ok_or_else(|| ClientError::NotFound {
                what: format!("created section {section} of {course}"),
            })?;
        info!(course, section, section_id = %id, "added section");
        Ok(id)
    }

    async fn enroll_in_course(
        &self,
        student: &StudentId,
        course: CourseId,
    ) -> Result<u64, ClientError> {
        affected(
            self,
            "enrollInCourse",
            queries::ENROLL_IN_COURSE,
            "enrollUsersInCourse",
            json!({ "users": [{ "user_id": student.as_str(), "course_id": course.0, "permission": 1 }] }),
        )
        .await
    }

    async fn enroll_in_section(
        &self,
        student: &StudentId,
        section: SectionId,
    ) -> Result<u64, ClientError> {
        affected(
            self,
            "enrollInSection",
            queries::ENROLL_IN_SECTION,
            "addUsersToSection",
            json!({ "users": [{ "user_id": student.as_str(), "section_id": section.0 }] }),
        )
        .await
    }

    async fn remove_from_course(&self, membership: MembershipId) -> Result<u64, ClientError> {
        affected(
            self,
            "removeFromCourse",
            queries::REMOVE_FROM_COURSE,
            "removeUsersFromCourse",
            json!({ "ids": [membership.0] }),
        )
        .await
    }

    async fn remove_from_section(&self, membership: MembershipId) -> Result<u64, ClientError> {
        affected(
            self,
            "removeFromSection",
            queries::REMOVE_FROM_SECTION,
            "removeUsersFromSection",
            json!({ "ids": [membership.0] }),
        )
        .await
    }

    async fn find_course_membership(
        &self,
        student: &StudentId,
        course: CourseId,
    ) -> Result<Option<MembershipId>, ClientError> {
        let data: BTreeMap<String, Vec<IdRow>> = self
            .execute(
                "findCourseMembership",
                queries::FIND_COURSE_MEMBERSHIP,
                json!({ "userId": student.as_str(), "courseId": course.0 }),
            )
            .await?;
        Ok(first_membership(&data, "course_user"))
    }

    async fn find_section_membership(
        &self,
        student: &StudentId,
        section: SectionId,
    ) -> Result<Option<MembershipId>, ClientError> {
        let data: BTreeMap<String, Vec<IdRow>> = self
            .execute(
                "findSectionMembership",
                queries::FIND_SECTION_MEMBERSHIP,
                json!({ "userId": student.as_str(), "sectionId": section.0 }),
            )
            .await?;
        Ok(first_membership(&data, "section_user"))
    }

    async fn fetch_old_snapshot(&self) -> Result<Snapshot, ClientError> {
        #[derive(Deserialize)]
        struct Data {
            users: Vec<User>,
        }
        #[derive(Deserialize)]
        struct User {
            id: i64,
            section_users: Vec<SectionUser>,
        }
        #[derive(Deserialize)]
        struct SectionUser {
            section: Section,
        }
        #[derive(Deserialize)]
        struct Section {
            name: String,
            course: Course,
        }
        #[derive(Deserialize)]
        struct Course {
            code: String,
            semester_id: u32,
        }

        let data: Data = self
            .execute(
                "fetchSectionMemberships",
                queries::FETCH_SECTION_MEMBERSHIPS,
                json!({}),
            )
            .await?;

        let snapshot: Snapshot = data
            .users
            .into_iter()
            .flat_map(|u| {
                let sid = u.id.to_string();
                u.section_users.into_iter().map(move |su| {
                    EnrollmentRecord::new(
                        sid.as_str(),
                        su.section.course.semester_id,
                        su.section.course.code,
                        su.section.name,
                    )
                })
            })
            .collect();
        info!(records = snapshot.len(), "fetched stored enrollment snapshot");
        Ok(snapshot)
    }

    async fn fetch_new_snapshot(
        &self,
        semester: SemesterId,
        feed: &[FeedEnrollment],
    ) -> Result<Snapshot, ClientError> {
        self.ensure_semester(semester).await?;

        let itscs = distinct_itscs(feed);
        let ids = self.resolve_users(&itscs).await?;

        let mut snapshot = Snapshot::empty();
        for row in feed {
            match ids.get(&row.itsc) {
                Some(sid) => snapshot.push(EnrollmentRecord::new(
                    sid.clone(),
                    semester.0,
                    &row.course,
                    &row.section,
                )),
                None => warn!(itsc = %row.itsc, "feed user could not be resolved; row skipped"),
            }
        }
        info!(records = snapshot.len(), semester = %semester, "built registrar enrollment snapshot");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> GraphqlRosterClient {
        GraphqlRosterClient::new(server.url("/graphql"), Some("s3cret".to_string()))
    }

    #[tokio::test]
    async fn existing_course_is_not_recreated() {
        let server = MockServer::start_async().await;
        let find = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .header(ADMIN_SECRET_HEADER, "s3cret")
                    .body_contains("query findCourse");
                then.status(200)
                    .json_body(json!({ "data": { "courses": [{ "id": 7 }] } }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql").body_contains("mutation createCourse");
                then.status(200)
                    .json_body(json!({ "data": { "createCourse": { "id": 99 } } }));
            })
            .await;

        let id = client(&server)
            .find_or_create_course(SemesterId(2110), "COMP2011")
            .await
            .unwrap();
        assert_eq!(id, CourseId(7));
        find.assert_async().await;
        assert_eq!(create.hits_async().await, 0);
    }

    #[tokio::test]
    async fn missing_course_is_created() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql").body_contains("query findCourse");
                then.status(200).json_body(json!({ "data": { "courses": [] } }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("mutation createCourse")
                    .body_contains("COMP2011");
                then.status(200)
                    .json_body(json!({ "data": { "createCourse": { "id": 12 } } }));
            })
            .await;

        let id = client(&server)
            .find_or_create_course(SemesterId(2110), "COMP2011")
            .await
            .unwrap();
        assert_eq!(id, CourseId(12));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn graphql_errors_surface_as_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(200).json_body(json!({
                    "errors": [{ "message": "field 'courses' not found" }]
                }));
            })
            .await;

        let err = client(&server)
            .find_or_create_course(SemesterId(2110), "COMP2011")
            .await
            .unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, Some(200));
                assert!(message.contains("findCourse"));
                assert!(message.contains("field 'courses' not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_failure_without_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(502).body("bad gateway");
            })
            .await;

        let err = client(&server)
            .remove_from_section(MembershipId(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn removal_returns_affected_rows() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("mutation removeFromSection");
                then.status(200).json_body(json!({
                    "data": { "removeUsersFromSection": { "affected_rows": 0 } }
                }));
            })
            .await;

        let n = client(&server)
            .remove_from_section(MembershipId(41))
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn missing_membership_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("query findSectionMembership");
                then.status(200)
                    .json_body(json!({ "data": { "section_user": [] } }));
            })
            .await;

        let m = client(&server)
            .find_section_membership(&StudentId::new("5"), SectionId(3))
            .await
            .unwrap();
        assert_eq!(m, None);
    }

    #[tokio::test]
    async fn old_snapshot_flattens_section_memberships() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("query fetchSectionMemberships");
                then.status(200).json_body(json!({ "data": { "users": [
                    { "id": 1, "section_users": [
                        { "section": { "name": "la1", "course": { "code": "comp2011", "semester_id": 2110 } } },
                        { "section": { "name": "L1", "course": { "code": "COMP2011", "semester_id": 2110 } } }
                    ]},
                    { "id": 2, "section_users": [] }
                ]}}));
            })
            .await;

        let snap = client(&server).fetch_old_snapshot().await.unwrap();
        assert_eq!(
            snap.records(),
            &[
                EnrollmentRecord::new("1", 2110, "COMP2011", "LA1"),
                EnrollmentRecord::new("1", 2110, "COMP2011", "L1"),
            ]
        );
    }

    #[tokio::test]
    async fn new_snapshot_registers_unknown_users() {
        let server = MockServer::start_async().await;
        let semester = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("mutation upsertSemester")
                    .body_contains("2021-22 Fall");
                then.status(200).json_body(json!({ "data": { "createSemester": {
                    "createdAt": "2021-09-01T00:00:00Z", "updatedAt": "2021-09-01T00:00:00Z"
                }}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql").body_contains("query findUsersByItsc");
                then.status(200).json_body(json!({ "data": { "users": [
                    { "id": 10, "itsc": "alice" }
                ]}}));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("mutation createUsers")
                    .body_contains("bob");
                then.status(200).json_body(json!({ "data": { "batchCreateUser": {
                    "affected_rows": 1, "returning": [{ "id": 11, "itsc": "bob" }]
                }}}));
            })
            .await;

        let feed = vec![
            FeedEnrollment::new("alice", "COMP2011", "LA1"),
            FeedEnrollment::new("bob", "COMP2011", "LA2"),
        ];
        let snap = client(&server)
            .fetch_new_snapshot(SemesterId(2110), &feed)
            .await
            .unwrap();

        semester.assert_async().await;
        create.assert_async().await;
        assert_eq!(
            snap.records(),
            &[
                EnrollmentRecord::new("10", 2110, "COMP2011", "LA1"),
                EnrollmentRecord::new("11", 2110, "COMP2011", "LA2"),
            ]
        );
    }

    #[tokio::test]
    async fn created_course_uses_catalog_title() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/catalog").query_param("code", "COMP2011");
                then.status(200).json_body(json!({ "name": "Programming with C++" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql").body_contains("query findCourse");
                then.status(200).json_body(json!({ "data": { "courses": [] } }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("mutation createCourse")
                    .body_contains("Programming with C++");
                then.status(200)
                    .json_body(json!({ "data": { "createCourse": { "id": 3 } } }));
            })
            .await;

        let c = client(&server).with_catalog(server.url("/catalog"));
        let id = c
            .find_or_create_course(SemesterId(2110), "COMP2011")
            .await
            .unwrap();
        assert_eq!(id, CourseId(3));
        create.assert_async().await;
    }

    #[test]
    fn debug_redacts_admin_secret() {
        let c = GraphqlRosterClient::new("http://localhost/graphql", Some("s3cret".to_string()));
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("s3cret"));
        assert!(dbg.contains("<REDACTED>"));
    }
}
