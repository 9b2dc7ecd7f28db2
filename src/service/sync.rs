use crate::db::{DbRepo, DevsyncStorage, UserId};
use crate::error::DevsyncError;
use crate::github::{GitHubEvent, GitHubSource, PER_PAGE};
use crate::service::contributions::derive_contributions;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a finished sync run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The user holds no GitHub token, so there was nothing to fetch.
    Skipped,
    Completed(SyncReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub repo_pages: u32,
    pub repos: usize,
    /// False when the event page could not be fetched; contributions were left untouched.
    pub events_fetched: bool,
    pub contribution_days: usize,
}

/// Drives one user's sync: repositories, then contributions, then the sync timestamp.
#[derive(Clone)]
pub struct SyncService {
    storage: DevsyncStorage,
    source: Arc<dyn GitHubSource>,
}

impl SyncService {
    pub fn new(storage: DevsyncStorage, source: Arc<dyn GitHubSource>) -> Self {
        Self { storage, source }
    }

    pub fn storage(&self) -> &DevsyncStorage {
        &self.storage
    }

    /// Sync a single user.
    ///
    /// Repository errors (fetch or upsert) abort the run and are returned; nothing from a
    /// partially paged listing is written. The contribution phase is best effort: a failed
    /// event fetch or a failed per-day upsert is logged and the run still completes and
    /// stamps `last_synced_at`.
    ///
    /// Only the first page of events is read and each derived day overwrites the stored
    /// count, so contributions reflect the most recent public events rather than history.
    pub async fn sync_user(&self, user_id: UserId) -> Result<SyncOutcome, DevsyncError> {
        let user = self.storage.get_user(user_id).await?;
        if !user.has_credential() {
            debug!(user_id, "no GitHub token stored; nothing to sync");
            return Ok(SyncOutcome::Skipped);
        }
        let token = user.access_token.as_str();

        let (repos, repo_pages) = self.fetch_all_repos(token).await?;
        self.storage.upsert_repos(user_id, &repos).await?;

        let mut report = SyncReport {
            repo_pages,
            repos: repos.len(),
            ..SyncReport::default()
        };

        match self.source.list_user_events(token, &user.username, 1).await {
            Ok(events) => {
                report.events_fetched = true;
                report.contribution_days = self.store_contributions(user_id, &events).await;
            }
            Err(e) => {
                warn!(user_id, username = %user.username, error = %e, "event fetch failed; keeping previous contributions");
            }
        }

        if let Err(e) = self.storage.mark_synced(user_id).await {
            warn!(user_id, error = %e, "failed to stamp last_synced_at");
        }

        info!(
            user_id,
            repos = report.repos,
            pages = report.repo_pages,
            contribution_days = report.contribution_days,
            "sync finished"
        );
        Ok(SyncOutcome::Completed(report))
    }

    /// Page through the repository listing until a short or empty page.
    async fn fetch_all_repos(&self, token: &str) -> Result<(Vec<DbRepo>, u32), DevsyncError> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let batch = self.source.list_user_repos(token, page).await?;
            let len = batch.len();
            all.extend(batch.into_iter().map(DbRepo::from));
            if len < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok((all, page))
    }

    async fn store_contributions(&self, user_id: UserId, events: &[GitHubEvent]) -> usize {
        let mut stored = 0;
        for (date, count) in derive_contributions(events) {
            match self.storage.upsert_contribution(user_id, date, count, None).await {
                Ok(()) => stored += 1,
                Err(e) => warn!(user_id, %date, error = %e, "contribution upsert failed"),
            }
        }
        stored
    }
}
