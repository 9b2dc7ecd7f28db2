use crate::error::DevsyncError;
use crate::service::hub::HubHandle;
use crate::service::sync::{SyncOutcome, SyncService};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub const STATS_UPDATED: &str = "stats_updated";

/// Spread `per_minute` syncs evenly over a minute with no burst, e.g. 20 means one every 3 s.
pub fn budget_quota(per_minute: u32) -> Quota {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(Duration::from_secs(60) / per_minute.get())
        .unwrap_or_else(|| Quota::per_minute(per_minute))
        .allow_burst(NonZeroU32::MIN)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub eligible: usize,
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Periodic sync of every user holding a GitHub token.
///
/// Users are processed one at a time, paced by a rate budget so the whole pass stays
/// under GitHub's per-token ceiling.
pub struct BatchScheduler {
    sync: SyncService,
    hub: Option<HubHandle>,
    interval: Duration,
    pacer: Arc<DefaultDirectRateLimiter>,
}

impl BatchScheduler {
    pub fn new(sync: SyncService, interval: Duration, quota: Quota) -> Self {
        Self {
            sync,
            hub: None,
            interval,
            pacer: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Notify live sessions after each completed sync.
    pub fn with_hub(mut self, hub: HubHandle) -> Self {
        self.hub = Some(hub);
        self
    }

    /// One pass over all eligible users. Only a failure to list users is returned;
    /// per-user failures are logged and counted.
    pub async fn run_pass(&self) -> Result<PassSummary, DevsyncError> {
        let ids = self.sync.storage().list_users_with_credential().await?;
        let mut summary = PassSummary {
            eligible: ids.len(),
            ..PassSummary::default()
        };
        if ids.is_empty() {
            info!("scheduled sync: no users to sync");
            return Ok(summary);
        }

        info!(users = ids.len(), "scheduled sync pass starting");
        for (i, id) in ids.iter().copied().enumerate() {
            self.pacer.until_ready().await;
            match self.sync.sync_user(id).await {
                Ok(SyncOutcome::Completed(_)) => {
                    summary.synced += 1;
                    info!(user_id = id, "synced user ({}/{})", i + 1, ids.len());
                    if let Some(hub) = self.hub.as_ref() {
                        hub.broadcast(id, STATS_UPDATED, Value::Null);
                    }
                }
                Ok(SyncOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(user_id = id, error = %e, "scheduled sync failed");
                }
            }
        }
        info!(
            synced = summary.synced,
            skipped = summary.skipped,
            failed = summary.failed,
            "scheduled sync pass done"
        );
        Ok(summary)
    }

    /// Run a pass now and then every `interval` until the handle is stopped or dropped.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "batch scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                tokio::select! {
                    res = self.run_pass() => {
                        if let Err(e) = res {
                            error!(error = %e, "scheduled sync pass aborted: could not list users");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            info!("batch scheduler stopped");
        });
        SchedulerHandle { shutdown, task }
    }
}

/// Lifecycle hook for a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it; an in-flight sync is cancelled.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "batch scheduler task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_paces_three_seconds_apart() {
        let quota = budget_quota(20);
        assert_eq!(quota.replenish_interval(), Duration::from_secs(3));
        assert_eq!(quota.burst_size().get(), 1);
    }

    #[test]
    fn zero_budget_falls_back_to_one_per_minute() {
        assert_eq!(budget_quota(0).replenish_interval(), Duration::from_secs(60));
    }
}
