use crate::db::{DbContribution, DbDailyStats, DbRepo};
use serde::{Deserialize, Serialize};

/// Reporting window for the stats endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Week,
    Month,
    #[default]
    Year,
}

impl StatsPeriod {
    /// Lenient parse: anything unrecognized means a year.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::to_ascii_lowercase).as_deref() {
            Some("week") => Self::Week,
            Some("month") => Self::Month,
            _ => Self::Year,
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageStats {
    pub language: String,
    pub repos: i64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    pub total_repos: usize,
    pub total_stars: i64,
    pub total_forks: i64,
    pub contributions: Vec<DbContribution>,
    pub languages: Vec<LanguageStats>,
    pub top_repos: Vec<DbRepo>,
    pub daily_stats: Vec<DbDailyStats>,
    pub contribution_sum: i64,
}
