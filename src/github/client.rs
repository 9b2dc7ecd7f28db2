use crate::config::{Config, GITHUB_ACCEPT};
use crate::error::{DevsyncError, IsRetryable};
use crate::github::PER_PAGE;
use crate::github::types::{GitHubEvent, GitHubRepo};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Paginated read access to the GitHub endpoints a sync run needs.
#[async_trait]
pub trait GitHubSource: Send + Sync {
    /// One page of the authenticated user's repositories, `PER_PAGE` items at most.
    async fn list_user_repos(&self, token: &str, page: u32)
    -> Result<Vec<GitHubRepo>, DevsyncError>;

    /// One page of `username`'s public events, newest first.
    async fn list_user_events(
        &self,
        token: &str,
        username: &str,
        page: u32,
    ) -> Result<Vec<GitHubEvent>, DevsyncError>;
}

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Stateless REST client; the access token travels with every call.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base: Url,
}

impl GitHubClient {
    pub fn new(cfg: &Config) -> Result<Self, DevsyncError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(cfg.github_user_agent.clone())
            .connect_timeout(Duration::from_secs(5))
            .timeout(cfg.http_timeout());
        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        Ok(Self {
            http: builder.build()?,
            base: Url::parse(&cfg.github_api_base)?,
        })
    }

    fn endpoint(&self, segments: &[&str], page: u32) -> Result<Url, DevsyncError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
    ) -> Result<Vec<T>, DevsyncError> {
        let http = &self.http;
        let url = &url;

        (|| async move {
            let mut req = http.get(url.clone()).header(ACCEPT, GITHUB_ACCEPT);
            if !token.is_empty() {
                req = req.bearer_auth(token);
            }
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(DevsyncError::Upstream { status, body });
            }
            Ok(resp.json::<Vec<T>>().await?)
        })
        .retry(default_retry_policy())
        .when(|e: &DevsyncError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(url = %url, "GitHub request retrying after error {}, sleeping {:?}", err, dur);
        })
        .await
    }
}

#[async_trait]
impl GitHubSource for GitHubClient {
    async fn list_user_repos(
        &self,
        token: &str,
        page: u32,
    ) -> Result<Vec<GitHubRepo>, DevsyncError> {
        let mut url = self.endpoint(&["user", "repos"], page)?;
        url.query_pairs_mut().append_pair("sort", "updated");
        let repos: Vec<GitHubRepo> = self.get_page(url, token).await?;
        debug!(page, count = repos.len(), "fetched repository page");
        Ok(repos)
    }

    async fn list_user_events(
        &self,
        token: &str,
        username: &str,
        page: u32,
    ) -> Result<Vec<GitHubEvent>, DevsyncError> {
        let url = self.endpoint(&["users", username, "events"], page)?;
        let events: Vec<GitHubEvent> = self.get_page(url, token).await?;
        debug!(username, page, count = events.len(), "fetched event page");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_base(base: &str) -> GitHubClient {
        let cfg = Config {
            github_api_base: base.to_string(),
            ..Config::default()
        };
        GitHubClient::new(&cfg).unwrap()
    }

    #[test]
    fn endpoint_joins_segments_and_paging() {
        let client = client_with_base("https://api.github.com");
        let url = client.endpoint(&["users", "octo cat", "events"], 2).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/users/octo%20cat/events?per_page=100&page=2"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = client_with_base("http://localhost:9000/github/");
        let url = client.endpoint(&["user", "repos"], 1).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/github/user/repos?per_page=100&page=1"
        );
    }
}
