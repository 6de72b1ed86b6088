//! Semester id -> display name / calendar year.
//!
//! Ids are `YYSS`: a two-digit year suffix followed by a season code
//! (`10` fall, `20` winter, `30` spring, `40` summer). Unknown season codes
//! are treated as fall.

use serde::{Deserialize, Serialize};

use crate::SemesterId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Fall,
    Winter,
    Spring,
    Summer,
}

impl Season {
    pub fn from_code(code: u32) -> Self {
        match code {
            20 => Season::Winter,
            30 => Season::Spring,
            40 => Season::Summer,
            _ => Season::Fall,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Fall => "Fall",
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemesterInfo {
    pub id: SemesterId,
    pub season: Season,
    /// Calendar year the semester falls in.
    pub year: i32,
    /// e.g. `"2021-22 Fall"`.
    pub name: String,
}

impl SemesterInfo {
    pub fn from_id(id: SemesterId) -> Self {
        let year_suffix = (id.0 / 100) as i32;
        let season = Season::from_code(id.0 % 100);
        let start_year = 2000 + year_suffix;
        let year = match season {
            Season::Fall | Season::Winter => start_year,
            Season::Spring | Season::Summer => start_year + 1,
        };
        let name = format!(
            "{}-{:02} {}",
            start_year,
            (year_suffix + 1) % 100,
            season.as_str()
        );
        Self {
            id,
            season,
            year,
            name,
        }
    }
}
