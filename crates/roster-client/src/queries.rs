//! GraphQL documents sent by [`crate::GraphqlRosterClient`].
//!
//! Operation names are unique so request logs (and test mocks) can tell the
//! operations apart by name alone.

pub(crate) const UPSERT_SEMESTER: &str = r#"
mutation upsertSemester($id: bigint!, $name: String!, $year: Int!) {
  createSemester(
    object: { id: $id, name: $name, year: $year }
    on_conflict: { constraint: semesters_pkey, update_columns: [updatedAt] }
  ) {
    createdAt
    updatedAt
  }
}
"#;

pub(crate) const FIND_USERS_BY_ITSC: &str = r#"
query findUsersByItsc($itscs: [String!]!) {
  users(where: { itsc: { _in: $itscs } }) {
    id
    itsc
  }
}
"#;

pub(crate) const CREATE_USERS: &str = r#"
mutation createUsers($users: [users_insert_input!]!) {
  batchCreateUser(objects: $users) {
    affected_rows
    returning {
      id
      itsc
    }
  }
}
"#;

pub(crate) const FIND_COURSE: &str = r#"
query findCourse($semesterId: bigint!, $code: String!) {
  courses(where: { code: { _eq: $code }, semester_id: { _eq: $semesterId } }) {
    id
  }
}
"#;

pub(crate) const CREATE_COURSE: &str = r#"
mutation createCourse($semesterId: bigint!, $code: String!, $name: String!) {
  createCourse(object: { code: $code, semester_id: $semesterId, name: $name }) {
    id
  }
}
"#;

pub(crate) const FIND_SECTION: &str = r#"
query findSection($semesterId: bigint!, $code: String!, $name: String!) {
  sections(
    where: {
      course: { code: { _eq: $code }, semester_id: { _eq: $semesterId } }
      name: { _eq: $name }
    }
  ) {
    id
  }
}
"#;

pub(crate) const CREATE_SECTION: &str = r#"
mutation createSection($courseId: bigint!, $name: String!) {
  createSection(object: { course_id: $courseId, name: $name }) {
    id
  }
}
"#;

pub(crate) const ENROLL_IN_COURSE: &str = r#"
mutation enrollInCourse($users: [course_user_insert_input!]!) {
  enrollUsersInCourse(objects: $users) {
    affected_rows
  }
}
"#;

pub(crate) const ENROLL_IN_SECTION: &str = r#"
mutation enrollInSection($users: [section_user_insert_input!]!) {
  addUsersToSection(objects: $users) {
    affected_rows
  }
}
"#;

pub(crate) const REMOVE_FROM_COURSE: &str = r#"
mutation removeFromCourse($ids: [bigint!]!) {
  removeUsersFromCourse(where: { id: { _in: $ids } }) {
    affected_rows
  }
}
"#;

pub(crate) const REMOVE_FROM_SECTION: &str = r#"
mutation removeFromSection($ids: [bigint!]!) {
  removeUsersFromSection(where: { id: { _in: $ids } }) {
    affected_rows
  }
}
"#;

pub(crate) const FIND_COURSE_MEMBERSHIP: &str = r#"
query findCourseMembership($userId: bigint!, $courseId: bigint!) {
  course_user(where: { user_id: { _eq: $userId }, course_id: { _eq: $courseId } }) {
    id
  }
}
"#;

pub(crate) const FIND_SECTION_MEMBERSHIP: &str = r#"
query findSectionMembership($userId: bigint!, $sectionId: bigint!) {
  section_user(where: { user_id: { _eq: $userId }, section_id: { _eq: $sectionId } }) {
    id
  }
}
"#;

pub(crate) const FETCH_SECTION_MEMBERSHIPS: &str = r#"
query fetchSectionMemberships {
  users {
    id
    section_users {
      section {
        name
        course {
          code
          semester_id
        }
      }
    }
  }
}
"#;
