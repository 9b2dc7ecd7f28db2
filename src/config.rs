use crate::service::hub::DEFAULT_OUTBOUND_CAPACITY;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Process-wide configuration, resolved once from defaults and `DEVSYNC_*` env vars.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("DEVSYNC_"))
        .extract()
        .unwrap_or_else(|e| {
            eprintln!("invalid DEVSYNC_* configuration, falling back to defaults: {e}");
            Config::default()
        })
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loglevel: String,
    pub listen_addr: String,
    pub database_url: String,
    pub github_api_base: String,
    pub github_user_agent: String,
    pub http_timeout_secs: u64,
    pub proxy: Option<Url>,
    /// Requests per client address per rolling minute on the protected API.
    pub rate_limit_per_minute: u32,
    pub sync_interval_secs: u64,
    /// How many users the batch scheduler may sync per minute.
    pub sync_budget_per_minute: u32,
    pub interactive_sync_timeout_secs: u64,
    pub outbound_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
            listen_addr: "0.0.0.0:8181".to_string(),
            database_url: "sqlite://devsync.sqlite".to_string(),
            github_api_base: GITHUB_API_BASE.to_string(),
            github_user_agent: "DevSync/1.0".to_string(),
            http_timeout_secs: 30,
            proxy: None,
            rate_limit_per_minute: 100,
            sync_interval_secs: 24 * 60 * 60,
            sync_budget_per_minute: 20,
            interactive_sync_timeout_secs: 60,
            outbound_queue_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn interactive_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.interactive_sync_timeout_secs.max(1))
    }
}
