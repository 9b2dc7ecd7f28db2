use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DevsyncError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GitHub API error {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Missing GitHub access token")]
    MissingAccessToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Sync did not finish within {0} seconds")]
    SyncTimeout(u64),

    #[error("Too many requests")]
    RateLimited,
}

/// Whether an error is worth retrying against the same upstream.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for DevsyncError {
    fn is_retryable(&self) -> bool {
        match self {
            DevsyncError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DevsyncError::Upstream { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl IntoResponse for DevsyncError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            DevsyncError::DatabaseError(_) | DevsyncError::RactorError(_) => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                };
                (status, body)
            }
            DevsyncError::Unauthorized | DevsyncError::MissingAccessToken => {
                let status = StatusCode::UNAUTHORIZED;
                let body = ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Authentication error.".to_string(),
                };
                (status, body)
            }
            DevsyncError::UserNotFound(_) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: "User not found.".to_string(),
                },
            ),
            DevsyncError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorBody {
                    code: "RATE_LIMIT".to_string(),
                    message: "Too many requests.".to_string(),
                },
            ),
            DevsyncError::SyncTimeout(secs) => (
                StatusCode::GATEWAY_TIMEOUT,
                ApiErrorBody {
                    code: "SYNC_TIMEOUT".to_string(),
                    message: format!("Sync did not finish within {secs} seconds."),
                },
            ),
            DevsyncError::Reqwest(_) | DevsyncError::UrlParse(_) | DevsyncError::Json(_) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "GitHub is unavailable.".to_string(),
                };
                (status, body)
            }
            DevsyncError::Upstream { status: code, body } => {
                let (err_code, msg) = match code {
                    StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN => {
                        ("UPSTREAM_RATE_LIMIT", "GitHub rate limit or permission error.")
                    }
                    StatusCode::UNAUTHORIZED => ("UPSTREAM_UNAUTHORIZED", "GitHub rejected the access token."),
                    StatusCode::NOT_FOUND => ("UPSTREAM_NOT_FOUND", "GitHub resource not found."),
                    _ => ("UPSTREAM_ERROR", "A GitHub API error occurred."),
                };

                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorBody {
                        code: err_code.to_string(),
                        message: format!("{msg} ({code}): {body}"),
                    },
                )
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_upstream_failures_are_retryable() {
        let server = DevsyncError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert!(server.is_retryable());

        let unauthorized = DevsyncError::Upstream {
            status: StatusCode::UNAUTHORIZED,
            body: "Bad credentials".to_string(),
        };
        assert!(!unauthorized.is_retryable());
        assert!(!DevsyncError::MissingAccessToken.is_retryable());
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let resp = DevsyncError::RateLimited.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
