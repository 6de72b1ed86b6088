use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRow {
    pub id: i64,
    pub semester: u32,
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRow {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
}

/// A course or section membership row. `parent_id` is the course or section id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRow {
    pub id: i64,
    pub student_id: String,
    pub parent_id: i64,
}

/// Entire paper roster. Serializable so a CLI run can start from a JSON file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperState {
    #[serde(default)]
    pub semesters: BTreeSet<u32>,
    /// login name -> student id
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    #[serde(default)]
    pub courses: Vec<CourseRow>,
    #[serde(default)]
    pub sections: Vec<SectionRow>,
    #[serde(default)]
    pub course_members: Vec<MemberRow>,
    #[serde(default)]
    pub section_members: Vec<MemberRow>,
    #[serde(default)]
    pub next_id: i64,
}

impl PaperState {
    pub(crate) fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn course(&self, semester: u32, code: &str) -> Option<&CourseRow> {
        self.courses
            .iter()
            .find(|c| c.semester == semester && c.code == code)
    }

    pub(crate) fn section(&self, course_id: i64, name: &str) -> Option<&SectionRow> {
        self.sections
            .iter()
            .find(|s| s.course_id == course_id && s.name == name)
    }

    pub(crate) fn course_by_id(&self, id: i64) -> Option<&CourseRow> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub(crate) fn ensure_course(&mut self, semester: u32, code: &str) -> i64 {
        if let Some(c) = self.course(semester, code) {
            return c.id;
        }
        let id = self.alloc_id();
        self.semesters.insert(semester);
        self.courses.push(CourseRow {
            id,
            semester,
            code: code.to_string(),
            name: code.to_string(),
        });
        id
    }

    pub(crate) fn ensure_section(&mut self, semester: u32, code: &str, name: &str) -> i64 {
        let course_id = self.ensure_course(semester, code);
        if let Some(s) = self.section(course_id, name) {
            return s.id;
        }
        let id = self.alloc_id();
        self.sections.push(SectionRow {
            id,
            course_id,
            name: name.to_string(),
        });
        id
    }

    pub(crate) fn add_member(members: &mut Vec<MemberRow>, id: i64, student_id: &str, parent_id: i64) -> u64 {
        if members
            .iter()
            .any(|m| m.student_id == student_id && m.parent_id == parent_id)
        {
            return 0;
        }
        members.push(MemberRow {
            id,
            student_id: student_id.to_string(),
            parent_id,
        });
        1
    }

    pub(crate) fn remove_member(members: &mut Vec<MemberRow>, id: i64) -> u64 {
        let before = members.len();
        members.retain(|m| m.id != id);
        (before - members.len()) as u64
    }

    pub(crate) fn find_member(members: &[MemberRow], student_id: &str, parent_id: i64) -> Option<i64> {
        members
            .iter()
            .find(|m| m.student_id == student_id && m.parent_id == parent_id)
            .map(|m| m.id)
    }
}
