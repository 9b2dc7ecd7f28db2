#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::StatusCode;
use devsync::db::{DevsyncStorage, NewUser, UserId};
use devsync::github::types::{EventPayload, GitHubEvent, GitHubRepo};
use devsync::github::{GitHubSource, PER_PAGE};
use devsync::DevsyncError;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// In-process stand-in for the GitHub REST API.
#[derive(Default)]
pub struct MockGitHub {
    pub repos: Mutex<Vec<GitHubRepo>>,
    pub events: Mutex<Vec<GitHubEvent>>,
    pub fail_repo_page: Mutex<Option<u32>>,
    pub fail_events: Mutex<bool>,
    pub failing_tokens: Mutex<HashSet<String>>,
    /// Holds every repository page for this long before answering.
    pub repo_delay: Mutex<Option<Duration>>,
    pub repo_calls: AtomicU32,
    pub event_calls: AtomicU32,
}

impl MockGitHub {
    pub fn with_repos(count: i64) -> Self {
        let mock = Self::default();
        *mock.repos.lock().unwrap() = (1..=count).map(|id| repo(id, id % 7)).collect();
        mock
    }

    pub fn repo_calls(&self) -> u32 {
        self.repo_calls.load(Ordering::SeqCst)
    }

    pub fn event_calls(&self) -> u32 {
        self.event_calls.load(Ordering::SeqCst)
    }
}

fn upstream(status: StatusCode, body: &str) -> DevsyncError {
    DevsyncError::Upstream {
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl GitHubSource for MockGitHub {
    async fn list_user_repos(
        &self,
        token: &str,
        page: u32,
    ) -> Result<Vec<GitHubRepo>, DevsyncError> {
        self.repo_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.repo_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_tokens.lock().unwrap().contains(token) {
            return Err(upstream(StatusCode::UNAUTHORIZED, "Bad credentials"));
        }
        if *self.fail_repo_page.lock().unwrap() == Some(page) {
            return Err(upstream(StatusCode::BAD_GATEWAY, "upstream hiccup"));
        }
        let repos = self.repos.lock().unwrap();
        let start = (page as usize - 1) * PER_PAGE;
        let end = (start + PER_PAGE).min(repos.len());
        Ok(repos.get(start..end).map(<[_]>::to_vec).unwrap_or_default())
    }

    async fn list_user_events(
        &self,
        _token: &str,
        _username: &str,
        _page: u32,
    ) -> Result<Vec<GitHubEvent>, DevsyncError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_events.lock().unwrap() {
            return Err(upstream(StatusCode::SERVICE_UNAVAILABLE, "events down"));
        }
        Ok(self.events.lock().unwrap().clone())
    }
}

pub fn repo(id: i64, stars: i64) -> GitHubRepo {
    GitHubRepo {
        id,
        name: format!("repo-{id}"),
        full_name: format!("octo/repo-{id}"),
        description: (id % 2 == 0).then(|| format!("repo number {id}")),
        stargazers_count: stars,
        forks_count: id % 3,
        language: Some(if id % 2 == 0 { "Rust" } else { "Go" }.to_string()),
        private: id % 5 == 0,
        updated_at: None,
    }
}

pub fn event(kind: &str, size: Option<i64>, created_at: &str) -> GitHubEvent {
    GitHubEvent {
        kind: kind.to_string(),
        repo: None,
        payload: EventPayload { size, action: None },
        created_at: created_at.to_string(),
    }
}

pub async fn memory_storage() -> DevsyncStorage {
    DevsyncStorage::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database")
}

pub async fn seed_user(storage: &DevsyncStorage, github_id: i64, token: &str) -> UserId {
    storage
        .upsert_user(NewUser {
            github_id,
            username: format!("octo{github_id}"),
            email: None,
            avatar_url: None,
            access_token: token.to_string(),
        })
        .await
        .expect("failed to seed user")
}
