//! Request gate: origin allow-list, API key and rate limiting.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::GatewayError;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Reject requests whose `Origin` is not on the allow-list. Requests
/// without an `Origin` header pass.
pub async fn check_origin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let origin = String::from_utf8_lossy(origin.as_bytes()).into_owned();
        if !state.settings.allowed_origins.iter().any(|allowed| *allowed == origin) {
            warn!(origin = %origin, "rejected request from disallowed origin");
            return GatewayError::OriginNotAllowed(origin).into_response();
        }
    }
    next.run(request).await
}

/// Require the configured API key in `x-api-key`. No-op when no key is configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(expected) = state.settings.api_key.as_deref() {
        let presented = request.headers().get(API_KEY_HEADER).map(HeaderValue::as_bytes);
        let valid = presented.is_some_and(|p| bool::from(p.ct_eq(expected.as_bytes())));
        if !valid {
            warn!(
                path = %request.uri().path(),
                key_present = presented.is_some(),
                "rejected request with invalid API key"
            );
            return GatewayError::Forbidden.into_response();
        }
    }
    next.run(request).await
}

/// Count the request against its client's budget.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.settings.trust_proxy);

    let decision = state.limiter.check(&key, Instant::now());
    if !decision.allowed {
        warn!(client = %key, retry_after_secs = decision.retry_after_secs, "rate limit exceeded");
        return GatewayError::RateLimited { retry_after_secs: decision.retry_after_secs }
            .into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

/// Client identity for rate limiting.
///
/// With `trust_proxy`, the left-most `X-Forwarded-For` entry wins; otherwise
/// the socket peer address. Falls back to `"unknown"` when neither is available.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_owned();
        }
    }
    peer.map_or_else(|| "unknown".to_owned(), |addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn peer_ip_is_used_without_proxy_trust() {
        let peer: SocketAddr = ([10, 0, 0, 7], 51_000).into();
        let key = client_key(&forwarded("203.0.113.9"), Some(peer), false);
        assert_eq!(key, "10.0.0.7", "forwarded header must be ignored");
    }

    #[test]
    fn leftmost_forwarded_entry_is_used_with_proxy_trust() {
        let peer: SocketAddr = ([10, 0, 0, 7], 51_000).into();
        let key = client_key(&forwarded(" 203.0.113.9 , 10.0.0.1"), Some(peer), true);
        assert_eq!(key, "203.0.113.9");
    }

    #[test]
    fn missing_identity_falls_back_to_unknown() {
        assert_eq!(client_key(&HeaderMap::new(), None, true), "unknown");
        assert_eq!(client_key(&forwarded(""), None, true), "unknown");
    }

    #[test]
    fn port_does_not_split_a_client() {
        let a: SocketAddr = ([192, 168, 1, 2], 1000).into();
        let b: SocketAddr = ([192, 168, 1, 2], 2000).into();
        assert_eq!(
            client_key(&HeaderMap::new(), Some(a), false),
            client_key(&HeaderMap::new(), Some(b), false)
        );
    }
}
