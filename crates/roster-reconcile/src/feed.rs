//! Registrar feed adapter: parse the registrar's enrollment export and
//! normalize it into [`FeedEnrollment`] rows.
//!
//! # Formats
//! - Structured JSON: `[{"itsc": "...", "course": "...", "section": "..."}]`
//! - Text export: one line per student, `itsc,COURSE-SECTION,COURSE-SECTION,...`
//!
//! Pure conversion. Resolving login names to system ids is the remote
//! client's job; this module never sees student ids.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::normalize_code;

/// One registrar row, keyed by the student's login name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedEnrollment {
    pub itsc: String,
    pub course: String,
    pub section: String,
}

impl FeedEnrollment {
    pub fn new(itsc: impl AsRef<str>, course: impl AsRef<str>, section: impl AsRef<str>) -> Self {
        Self {
            itsc: itsc.as_ref().trim().to_string(),
            course: normalize_code(course.as_ref()),
            section: normalize_code(section.as_ref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("line {line}: empty login name")]
    MissingItsc { line: usize },
    #[error("line {line}: malformed course-section pair '{raw}'")]
    MalformedPair { line: usize, raw: String },
    #[error("feed json decode failed: {0}")]
    Json(String),
}

fn parse_pair(line: usize, raw: &str) -> Result<(String, String), FeedError> {
    let malformed = || FeedError::MalformedPair {
        line,
        raw: raw.to_string(),
    };
    let (course, section) = raw.trim().split_once('-').ok_or_else(malformed)?;
    let course = normalize_code(course);
    let section = normalize_code(section);
    if course.is_empty() || section.is_empty() {
        return Err(malformed());
    }
    Ok((course, section))
}

fn parse_line(line_no: usize, line: &str) -> Result<Vec<FeedEnrollment>, FeedError> {
    let mut parts = line.split(',');
    let itsc = parts.next().unwrap_or_default().trim();
    if itsc.is_empty() {
        return Err(FeedError::MissingItsc { line: line_no });
    }
    let mut out = Vec::new();
    for raw in parts.filter(|p| !p.trim().is_empty()) {
        let (course, section) = parse_pair(line_no, raw)?;
        out.push(FeedEnrollment {
            itsc: itsc.to_string(),
            course,
            section,
        });
    }
    Ok(out)
}

/// Parse a text export, failing on the first malformed line.
pub fn parse_text(text: &str) -> Result<Vec<FeedEnrollment>, FeedError> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        out.extend(parse_line(idx + 1, line)?);
    }
    Ok(out)
}

/// Lenient variant: malformed lines are skipped and reported.
pub fn parse_text_lenient(text: &str) -> (Vec<FeedEnrollment>, Vec<FeedError>) {
    let mut out = Vec::new();
    let mut errors = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(idx + 1, line) {
            Ok(rows) => out.extend(rows),
            Err(e) => errors.push(e),
        }
    }
    (out, errors)
}

/// Decode a structured JSON feed, normalizing every row.
pub fn parse_json(json: &str) -> Result<Vec<FeedEnrollment>, FeedError> {
    let raw: Vec<FeedEnrollment> =
        serde_json::from_str(json).map_err(|e| FeedError::Json(e.to_string()))?;
    raw.into_iter()
        .enumerate()
        .map(|(idx, r)| {
            if r.itsc.trim().is_empty() {
                return Err(FeedError::MissingItsc { line: idx + 1 });
            }
            Ok(FeedEnrollment::new(r.itsc, r.course, r.section))
        })
        .collect()
}

/// Distinct login names in first-seen order.
pub fn distinct_itscs(rows: &[FeedEnrollment]) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    rows.iter()
        .filter(|r| seen.insert(r.itsc.clone()))
        .map(|r| r.itsc.clone())
        .collect()
}
