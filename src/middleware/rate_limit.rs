use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::debug;

use crate::error::DevsyncError;
use crate::service::SlidingWindowLimiter;

/// Peer address of the request, or `0.0.0.0` when the server was not started with
/// connect info (all such requests then share one window).
pub fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Admission check in front of the protected API.
pub async fn rate_limit(
    State(limiter): State<SlidingWindowLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if !limiter.allow(ip) {
        debug!(%ip, limit = limiter.limit(), "request rejected by rate limiter");
        return DevsyncError::RateLimited.into_response();
    }
    next.run(req).await
}
