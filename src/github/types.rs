use serde::{Deserialize, Serialize};

/// Subset of the `/user/repos` item shape that DevSync stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubRepo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: i64,
    #[serde(default)]
    pub forks_count: i64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One item of `/users/{username}/events`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub repo: Option<EventRepo>,
    #[serde(default)]
    pub payload: EventPayload,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRepo {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventPayload {
    /// Number of commits carried by a `PushEvent`.
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub action: Option<String>,
}

pub const PUSH_EVENT: &str = "PushEvent";
pub const PULL_REQUEST_EVENT: &str = "PullRequestEvent";
pub const ISSUES_EVENT: &str = "IssuesEvent";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_without_payload_fields_still_parses() {
        let raw = r#"{"type":"PushEvent","created_at":"2024-05-01T10:00:00Z","payload":{}}"#;
        let event: GitHubEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, PUSH_EVENT);
        assert_eq!(event.payload.size, None);
        assert!(event.repo.is_none());
    }

    #[test]
    fn repo_with_null_description_and_language() {
        let raw = r#"{"id":9,"name":"x","full_name":"me/x","description":null,
                      "stargazers_count":3,"forks_count":1,"language":null,"private":true}"#;
        let repo: GitHubRepo = serde_json::from_str(raw).unwrap();
        assert_eq!(repo.description, None);
        assert!(repo.private);
    }
}
