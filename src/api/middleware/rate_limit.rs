//! Rate limiting middleware backed by a Redis counter.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::api::AppState;
use crate::config::{
    RATE_LIMIT_AUTH_REQUESTS, RATE_LIMIT_AUTH_WINDOW_SECONDS, RATE_LIMIT_REQUESTS,
    RATE_LIMIT_WINDOW_SECONDS,
};

const RETRY_AFTER: HeaderName = HeaderName::from_static("retry-after");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from(self.retry_after));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("0"));

        (
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            "Too many requests. Please try again later.",
        )
            .into_response()
    }
}

/// Limit and window applied to one group of routes.
#[derive(Debug, Clone, Copy)]
struct Policy {
    scope: &'static str,
    max_requests: u64,
    window_seconds: u64,
}

const GENERAL: Policy = Policy {
    scope: "general",
    max_requests: RATE_LIMIT_REQUESTS,
    window_seconds: RATE_LIMIT_WINDOW_SECONDS,
};

const AUTH: Policy = Policy {
    scope: "auth",
    max_requests: RATE_LIMIT_AUTH_REQUESTS,
    window_seconds: RATE_LIMIT_AUTH_WINDOW_SECONDS,
};

/// Client identifier: first X-Forwarded-For hop, X-Real-IP, then peer address.
fn client_identifier(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header("x-forwarded-for").and_then(|f| f.split(',').next()) {
        return ip.trim().to_string();
    }
    if let Some(ip) = header("x-real-ip") {
        return ip.to_string();
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "unknown".to_string()
}

async fn enforce(
    policy: Policy,
    state: AppState,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let client_id = client_identifier(&request);
    let key = format!("{}:{}", policy.scope, client_id);

    let (count, allowed) = match state
        .rate_limiter
        .hit(&key, policy.max_requests, policy.window_seconds)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            // fail closed
            tracing::error!(scope = policy.scope, error = %e, "Rate limit check failed - denying request");
            return Err(RateLimitError {
                retry_after: policy.window_seconds,
            });
        }
    };

    if !allowed {
        tracing::warn!(scope = policy.scope, client = %client_id, count, "Rate limit exceeded");
        return Err(RateLimitError {
            retry_after: policy.window_seconds,
        });
    }

    let mut response = next.run(request).await;

    let remaining = policy.max_requests.saturating_sub(count);
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(policy.max_requests));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));

    Ok(response)
}

/// General limit for authenticated routes.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(GENERAL, state, request, next).await
}

/// Stricter limit for the public registration, login and recovery routes.
pub async fn rate_limit_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(AUTH, state, request, next).await
}
