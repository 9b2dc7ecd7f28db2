use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::DevsyncStorage;
use crate::handlers::{stats, user, ws};
use crate::middleware::{IdentityResolver, rate_limit};
use crate::service::{HubHandle, SlidingWindowLimiter, StatsService, SyncService};

#[derive(Clone)]
pub struct DevsyncState {
    pub storage: DevsyncStorage,
    pub sync: SyncService,
    pub stats: StatsService,
    pub hub: HubHandle,
    pub identity: Arc<dyn IdentityResolver>,
    pub limiter: SlidingWindowLimiter,
    pub sync_timeout: Duration,
    pub outbound_capacity: usize,
}

impl DevsyncState {
    pub fn new(
        sync: SyncService,
        hub: HubHandle,
        identity: Arc<dyn IdentityResolver>,
        cfg: &Config,
    ) -> Self {
        let storage = sync.storage().clone();
        Self {
            stats: StatsService::new(storage.clone()),
            storage,
            sync,
            hub,
            identity,
            limiter: SlidingWindowLimiter::per_minute(cfg.rate_limit_per_minute),
            sync_timeout: cfg.interactive_sync_timeout(),
            outbound_capacity: cfg.outbound_queue_capacity,
        }
    }
}

pub fn devsync_router(state: DevsyncState) -> Router {
    let api = Router::new()
        .route("/user", get(user::me_handler))
        .route("/user/sync", post(user::sync_handler))
        .route("/user/stats", get(stats::user_stats_handler))
        .route("/user/repos", get(stats::repos_handler))
        .route("/user/contributions", get(stats::contributions_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit,
        ));

    Router::new()
        .nest("/api", api)
        .route("/ws/updates", get(ws::updates_handler))
        .with_state(state)
}
