use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::info;

use crate::db::DbUser;
use crate::middleware::AuthenticatedUser;
use crate::router::DevsyncState;
use crate::service::SyncOutcome;
use crate::service::scheduler::STATS_UPDATED;
use crate::DevsyncError;

/// GET /api/user -> the caller's profile (the access token is never serialized).
pub async fn me_handler(
    State(state): State<DevsyncState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<DbUser>, DevsyncError> {
    Ok(Json(state.storage.get_user(user_id).await?))
}

/// POST /api/user/sync -> sync now under a deadline, then notify the user's live sessions.
pub async fn sync_handler(
    State(state): State<DevsyncState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Value>, DevsyncError> {
    let deadline = state.sync_timeout;
    let outcome = tokio::time::timeout(deadline, state.sync.sync_user(user_id))
        .await
        .map_err(|_| DevsyncError::SyncTimeout(deadline.as_secs()))??;

    if let SyncOutcome::Completed(report) = &outcome {
        info!(user_id, repos = report.repos, "interactive sync done");
        state.hub.broadcast(user_id, STATS_UPDATED, Value::Null);
    }
    Ok(Json(json!({ "status": "ok" })))
}
