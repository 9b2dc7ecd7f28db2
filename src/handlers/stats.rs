use axum::{
    Json,
    extract::{Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::DevsyncError;
use crate::db::{DbContribution, DbRepo};
use crate::middleware::AuthenticatedUser;
use crate::router::DevsyncState;
use crate::types::{StatsPeriod, UserStats};

const DEFAULT_REPO_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReposQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ContributionsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/user/stats?period=week|month|year
pub async fn user_stats_handler(
    State(state): State<DevsyncState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<StatsQuery>,
) -> Result<Json<UserStats>, DevsyncError> {
    let period = StatsPeriod::parse(query.period.as_deref());
    Ok(Json(state.stats.user_stats(user_id, period).await?))
}

/// GET /api/user/repos?limit=N
pub async fn repos_handler(
    State(state): State<DevsyncState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<ReposQuery>,
) -> Result<Json<Vec<DbRepo>>, DevsyncError> {
    let limit = query.limit.unwrap_or(DEFAULT_REPO_LIMIT);
    Ok(Json(state.stats.repos(user_id, limit).await?))
}

/// GET /api/user/contributions?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn contributions_handler(
    State(state): State<DevsyncState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<ContributionsQuery>,
) -> Result<Json<Vec<DbContribution>>, DevsyncError> {
    Ok(Json(
        state
            .stats
            .contributions(user_id, query.from, query.to)
            .await?,
    ))
}
