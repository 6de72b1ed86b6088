use serde::{Deserialize, Serialize};

use crate::EnrollmentRecord;

/// Section-name prefix predicate selecting the records under reconciliation.
///
/// Records whose section matches none of the prefixes are invisible to the
/// diff: they never produce a drop, add or swap, even if they changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFilter {
    prefixes: Vec<String>,
}

impl Default for SectionFilter {
    /// Lab sections only (`LA*`).
    fn default() -> Self {
        Self::labs()
    }
}

impl SectionFilter {
    pub fn labs() -> Self {
        Self::with_prefixes(["LA"])
    }

    /// Prefixes are compared case-insensitively; blank prefixes are ignored.
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_ascii_uppercase())
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort();
        prefixes.dedup();
        Self { prefixes }
    }

    /// Accepts every section.
    pub fn all() -> Self {
        Self {
            prefixes: vec![String::new()],
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn accepts_section(&self, section: &str) -> bool {
        let section = section.trim().to_ascii_uppercase();
        self.prefixes.iter().any(|p| section.starts_with(p.as_str()))
    }

    pub fn accepts(&self, record: &EnrollmentRecord) -> bool {
        self.accepts_section(&record.section)
    }
}
