use devsync::config::CONFIG;
use devsync::db::DevsyncStorage;
use devsync::middleware::SessionTokenResolver;
use devsync::router::{DevsyncState, devsync_router};
use devsync::service::scheduler::budget_quota;
use devsync::{BatchScheduler, GitHubClient, SyncService};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        github_api_base = %cfg.github_api_base,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        rate_limit_per_minute = cfg.rate_limit_per_minute,
        sync_budget_per_minute = cfg.sync_budget_per_minute,
        loglevel = %cfg.loglevel,
    );

    let storage = DevsyncStorage::connect(&cfg.database_url).await?;
    let github = Arc::new(GitHubClient::new(cfg)?);
    let sync = SyncService::new(storage.clone(), github);

    let hub = devsync::service::hub::spawn().await?;

    let scheduler = BatchScheduler::new(
        sync.clone(),
        cfg.sync_interval(),
        budget_quota(cfg.sync_budget_per_minute),
    )
    .with_hub(hub.clone())
    .start();

    let identity = Arc::new(SessionTokenResolver::new(storage.clone()));
    let state = DevsyncState::new(sync, hub.clone(), identity, cfg);
    let sweeper = state.limiter.spawn_sweeper();
    let app = devsync_router(state);

    let listener = TcpListener::bind(cfg.listen_addr.as_str()).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await?;

    scheduler.stop().await;
    sweeper.abort();
    hub.stop();
    Ok(())
}
