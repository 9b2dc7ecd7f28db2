use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};

use crate::db::{DevsyncStorage, UserId};
use crate::error::DevsyncError;
use crate::router::DevsyncState;

/// Maps an opaque session token issued by the login flow to a user.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, DevsyncError>;
}

/// Looks tokens up in `users.session_token`.
pub struct SessionTokenResolver {
    storage: DevsyncStorage,
}

impl SessionTokenResolver {
    pub fn new(storage: DevsyncStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl IdentityResolver for SessionTokenResolver {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, DevsyncError> {
        self.storage.user_id_by_session_token(token).await
    }
}

/// Pull the session token from the request.
/// Accepts either:
/// - Header: `Authorization: Bearer <token>`
/// - Query string: `?token=...` (browsers cannot set headers on WebSocket upgrades)
pub async fn session_token<S>(parts: &mut Parts, state: &S) -> Option<String>
where
    S: Send + Sync,
{
    if let Ok(TypedHeader(Authorization(bearer))) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
    {
        return Some(bearer.token().to_string());
    }

    let qs = parts.uri.query()?;
    url::form_urlencoded::parse(qs.as_bytes())
        .find(|(k, v)| k == "token" && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

/// The user behind the request's session token; rejects with 401 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub UserId);

impl FromRequestParts<DevsyncState> for AuthenticatedUser {
    type Rejection = DevsyncError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DevsyncState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts, state)
            .await
            .ok_or(DevsyncError::Unauthorized)?;
        let user_id = state
            .identity
            .resolve(&token)
            .await?
            .ok_or(DevsyncError::Unauthorized)?;
        Ok(Self(user_id))
    }
}
