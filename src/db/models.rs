use crate::github::types::GitHubRepo;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbUser {
    pub id: UserId,
    pub github_id: i64,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    pub fn has_credential(&self) -> bool {
        !self.access_token.is_empty()
    }
}

/// Login-time profile used to create or refresh a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub github_id: i64,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbRepo {
    pub github_id: i64,
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub stars: i64,
    pub forks: i64,
    pub language: String,
    pub is_private: bool,
}

impl From<GitHubRepo> for DbRepo {
    fn from(r: GitHubRepo) -> Self {
        Self {
            github_id: r.id,
            name: r.name,
            full_name: r.full_name,
            description: r.description.unwrap_or_default(),
            stars: r.stargazers_count,
            forks: r.forks_count,
            language: r.language.unwrap_or_default(),
            is_private: r.private,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbContribution {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbDailyStats {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub commits: i64,
    pub prs: i64,
    pub issues: i64,
    pub stars_received: i64,
}
