use crate::db::{DbContribution, DbDailyStats, DbRepo, DevsyncStorage, UserId};
use crate::error::DevsyncError;
use crate::types::{LanguageStats, StatsPeriod, UserStats};
use chrono::{Days, NaiveDate, Utc};
use std::collections::HashMap;

/// Repositories considered for the totals and language breakdown.
const STATS_REPO_LIMIT: i64 = 100;
const TOP_REPOS: usize = 10;

/// Read side over synced data.
#[derive(Clone)]
pub struct StatsService {
    storage: DevsyncStorage,
}

impl StatsService {
    pub fn new(storage: DevsyncStorage) -> Self {
        Self { storage }
    }

    pub async fn user_stats(
        &self,
        user_id: UserId,
        period: StatsPeriod,
    ) -> Result<UserStats, DevsyncError> {
        let to = Utc::now().date_naive();
        let from = days_before(to, period.days());

        let repos = self.storage.list_repos(user_id, STATS_REPO_LIMIT).await?;
        let contributions = self.storage.contributions_in_range(user_id, from, to).await?;
        let daily = self.storage.daily_stats_in_range(user_id, from, to).await?;
        Ok(build_user_stats(repos, contributions, daily))
    }

    pub async fn repos(&self, user_id: UserId, limit: i64) -> Result<Vec<DbRepo>, DevsyncError> {
        self.storage.list_repos(user_id, limit).await
    }

    /// Contributions in `[from, to]`, defaulting to the last 365 days.
    pub async fn contributions(
        &self,
        user_id: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DbContribution>, DevsyncError> {
        let to = to.unwrap_or_else(|| Utc::now().date_naive());
        let from = from.unwrap_or_else(|| days_before(to, StatsPeriod::Year.days()));
        self.storage.contributions_in_range(user_id, from, to).await
    }
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_sub_days(Days::new(days.unsigned_abs()))
        .unwrap_or(NaiveDate::MIN)
}

/// Aggregate rows (repos already ordered by stars) into the dashboard payload.
pub fn build_user_stats(
    repos: Vec<DbRepo>,
    contributions: Vec<DbContribution>,
    daily_stats: Vec<DbDailyStats>,
) -> UserStats {
    let total_stars: i64 = repos.iter().map(|r| r.stars).sum();
    let total_forks: i64 = repos.iter().map(|r| r.forks).sum();
    let contribution_sum: i64 = contributions.iter().map(|c| c.count).sum();
    let languages = language_breakdown(&repos);

    UserStats {
        total_repos: repos.len(),
        total_stars,
        total_forks,
        contributions,
        languages,
        top_repos: repos.into_iter().take(TOP_REPOS).collect(),
        daily_stats,
        contribution_sum,
    }
}

/// Share of repositories per primary language, largest first.
pub fn language_breakdown(repos: &[DbRepo]) -> Vec<LanguageStats> {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for repo in repos.iter().filter(|r| !r.language.is_empty()) {
        *counts.entry(repo.language.as_str()).or_insert(0) += 1;
    }
    let total: i64 = counts.values().sum();

    let mut out: Vec<LanguageStats> = counts
        .into_iter()
        .map(|(language, repos)| LanguageStats {
            language: language.to_string(),
            repos,
            percent: if total > 0 {
                repos as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();
    out.sort_by(|a, b| b.repos.cmp(&a.repos).then_with(|| a.language.cmp(&b.language)));
    out
}
