//! Key codec: enrollment record -> composite key -> stable string and back.
//!
//! Diff maps are keyed by the structured [`EnrollmentKey`]; the string form is
//! used for logs, CLI output and JSON dumps. Fields are comma-joined and any
//! `,` or `\` inside a field is backslash-escaped, so the encoding is
//! unambiguous and [`parse_key_string`] is its exact inverse.

use thiserror::Error;

use crate::{EnrollmentKey, EnrollmentRecord, SemesterId, StudentId};

const SEP: char = ',';
const ESC: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyCodecError {
    #[error("key string '{raw}' has {found} field(s), expected 3")]
    FieldCount { raw: String, found: usize },
    #[error("key string '{raw}' has invalid semester '{semester}'")]
    InvalidSemester { raw: String, semester: String },
    #[error("key string '{raw}' ends with a dangling escape")]
    DanglingEscape { raw: String },
}

pub fn to_key(record: &EnrollmentRecord) -> EnrollmentKey {
    record.key()
}

pub fn to_key_string(key: &EnrollmentKey) -> String {
    let mut out = String::with_capacity(key.student_id.as_str().len() + key.course.len() + 8);
    push_escaped(&mut out, key.student_id.as_str());
    out.push(SEP);
    out.push_str(&key.semester.0.to_string());
    out.push(SEP);
    push_escaped(&mut out, &key.course);
    out
}

pub fn parse_key_string(raw: &str) -> Result<EnrollmentKey, KeyCodecError> {
    let fields = split_escaped(raw)?;
    if fields.len() != 3 {
        return Err(KeyCodecError::FieldCount {
            raw: raw.to_string(),
            found: fields.len(),
        });
    }

    let semester = fields[1]
        .parse::<u32>()
        .map_err(|_| KeyCodecError::InvalidSemester {
            raw: raw.to_string(),
            semester: fields[1].clone(),
        })?;
    // Fields are taken verbatim, empty ones included: whatever a key holds,
    // its string form parses back to it.
    Ok(EnrollmentKey {
        student_id: StudentId::verbatim(fields[0].clone()),
        semester: SemesterId(semester),
        course: fields[2].clone(),
    })
}

fn push_escaped(out: &mut String, field: &str) {
    for c in field.chars() {
        if c == SEP || c == ESC {
            out.push(ESC);
        }
        out.push(c);
    }
}

fn split_escaped(raw: &str) -> Result<Vec<String>, KeyCodecError> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            ESC => match chars.next() {
                Some(next) => cur.push(next),
                None => {
                    return Err(KeyCodecError::DanglingEscape {
                        raw: raw.to_string(),
                    })
                }
            },
            SEP => fields.push(std::mem::take(&mut cur)),
            other => cur.push(other),
        }
    }
    fields.push(cur);
    Ok(fields)
}
