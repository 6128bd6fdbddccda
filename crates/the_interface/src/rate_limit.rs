//! Per-IP rate limiting middleware (spec.md section 6.3:
//! `RATE_LIMIT_PER_MINUTE`, `RATE_LIMIT_PER_HOUR`, `RATE_LIMIT_WHITELIST`).
//!
//! Backed by `the_collective::memory::TheMemory`'s fixed-window counters
//! (C8); a Redis outage fails the request open (the cache is a hint, not a
//! ledger - spec.md section 4.8).

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::AppState;

/// Scenario 3 (spec.md section 8): the caller that exceeds
/// `RATE_LIMIT_PER_MINUTE` gets `retry_after=60` and
/// `X-RateLimit-Remaining-Minute: 0`; requests are otherwise untouched.
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&request, addr);

    if state
        .charter
        .interface
        .rate_limit_whitelist
        .iter()
        .any(|w| w == &ip)
    {
        return Ok(next.run(request).await);
    }

    let per_minute = state.charter.interface.rate_limit_per_minute as u64;
    let per_hour = state.charter.interface.rate_limit_per_hour as u64;

    let minute_ok = state.memory.rate_limit_allow(&format!("ip:{ip}:m"), 60, per_minute).await;
    let hour_ok = state.memory.rate_limit_allow(&format!("ip:{ip}:h"), 3600, per_hour).await;

    if !minute_ok {
        return Err(ApiError::rate_limited(60));
    }
    if !hour_ok {
        return Err(ApiError::rate_limited(3600));
    }

    Ok(next.run(request).await)
}

/// Prefer a load-balancer-supplied `X-Forwarded-For` header (first hop) over
/// the raw socket address, since the service typically sits behind a proxy;
/// falls back to the connection's peer address otherwise.
fn client_ip(request: &Request<axum::body::Body>, addr: SocketAddr) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

/// CORS allow-list built from `ALLOWED_ORIGINS`; an empty list means no
/// cross-origin access is granted rather than the permissive "allow any"
/// default, since the teacher's own `Any` CORS layer is unsuited to an
/// internet-facing read API.
pub fn cors_layer(allowed_origins: &[String]) -> tower_http::cors::CorsLayer {
    use tower_http::cors::{AllowOrigin, CorsLayer};

    if allowed_origins.is_empty() {
        return CorsLayer::new();
    }

    let origins: Vec<axum::http::HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([axum::http::Method::GET])
}
