//! Rate limiting: fixed-window limiters for the API and for login, plus a
//! per-IP token bucket.

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor},
};
use tracing::warn;

use crate::api::middleware::auth::{CurrentUser, authenticate, has_credentials};
use crate::{error::AppError, state::AppState, utils::client_ip::client_ip};

/// Length of one login rate limit window.
pub const LOGIN_WINDOW_SECONDS: u64 = 60;

/// Length of one API rate limit window.
pub const API_WINDOW_SECONDS: u64 = 60;

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// A fixed window aligned to multiples of [`API_WINDOW_SECONDS`] since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    index: u64,
    /// Unix time at which the window closes.
    reset_at: u64,
}

impl Window {
    fn at(unix_seconds: u64) -> Self {
        let index = unix_seconds / API_WINDOW_SECONDS;
        Self {
            index,
            reset_at: (index + 1) * API_WINDOW_SECONDS,
        }
    }

    fn seconds_left(&self, unix_seconds: u64) -> u64 {
        self.reset_at.saturating_sub(unix_seconds).max(1)
    }
}

/// Limits every API request with a fixed window counter in the cache.
///
/// Callers whose credentials resolve are counted per user
/// (`rate_limit:user:{id}`) against `authenticated_per_minute`; everyone else
/// per client IP (`rate_limit:ip:{ip}`) against `anonymous_per_minute`.
/// Responses carry `X-RateLimit-Limit`, `X-RateLimit-Remaining` and
/// `X-RateLimit-Reset` (unix seconds) unless an inner limiter already set
/// them. Over the limit the request is rejected with `429` and
/// `Retry-After`. If the counter cannot be read the request is let through.
///
/// A resolved user is handed on as [`CurrentUser`] so authentication runs once.
pub async fn request_layer(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let settings = &st.settings.rate_limit;
    if !settings.enabled {
        return next.run(req).await;
    }

    let ip = client_ip(&req, settings.behind_proxy);
    let (mut parts, body) = req.into_parts();

    let caller = if has_credentials(&parts.headers) {
        authenticate(&st, &mut parts).await.ok()
    } else {
        None
    };
    let (scope, subject, limit) = match &caller {
        Some(user) => ("user", user.id.to_string(), settings.authenticated_per_minute),
        None => ("ip", ip, settings.anonymous_per_minute),
    };
    if let Some(user) = caller {
        parts.extensions.insert(CurrentUser(user));
    }
    let req = Request::from_parts(parts, body);

    let now = Utc::now().timestamp().max(0) as u64;
    let window = Window::at(now);
    let key = format!("rate_limit:{}:{}:{}", scope, subject, window.index);

    let count = match st.cache.increment(&key, API_WINDOW_SECONDS).await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "API rate limit unavailable, allowing request");
            return next.run(req).await;
        }
    };

    if count > limit {
        counter!("rate_limit_rejections_total", "scope" => scope).increment(1);
        warn!(scope, subject = %subject, requests = count, "API rate limit exceeded");

        let retry_after = window.seconds_left(now);
        let mut response = AppError::rate_limited(
            format!("Rate limit exceeded. Maximum {} requests per minute.", limit),
            json!({ "limit": limit, "window_seconds": API_WINDOW_SECONDS }),
        )
        .into_response();

        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
        headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(0u64));
        headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(window.reset_at));
        return response;
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    if !headers.contains_key(&X_RATELIMIT_LIMIT) {
        headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
        headers.insert(
            X_RATELIMIT_REMAINING.clone(),
            HeaderValue::from(limit.saturating_sub(count)),
        );
        headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(window.reset_at));
    }
    response
}

/// Limits login attempts per client IP with a fixed window counter in the
/// cache (`rate_limit:login:{ip}`).
///
/// Every response carries `X-RateLimit-Limit` and `X-RateLimit-Remaining`.
/// Once the limit is exceeded the request is rejected with `429` and
/// `Retry-After`. If the counter cannot be read the request is let through.
pub async fn login_layer(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let settings = &st.settings.rate_limit;
    if !settings.enabled {
        return next.run(req).await;
    }

    let limit = settings.login_per_minute;
    let ip = client_ip(&req, settings.behind_proxy);
    let key = format!("rate_limit:login:{}", ip);

    let count = match st.cache.increment(&key, LOGIN_WINDOW_SECONDS).await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Login rate limit unavailable, allowing request");
            return next.run(req).await;
        }
    };

    if count > limit {
        counter!("rate_limit_rejections_total", "scope" => "login").increment(1);
        warn!(client_ip = %ip, attempts = count, "Login rate limit exceeded");

        let mut response = AppError::rate_limited(
            "Too many login attempts",
            json!({ "limit": limit, "window_seconds": LOGIN_WINDOW_SECONDS }),
        )
        .into_response();

        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(LOGIN_WINDOW_SECONDS));
        headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
        headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(0u64));
        return response;
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(
        X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(limit.saturating_sub(count)),
    );
    response
}

/// Wraps `router` in a per-IP token bucket (2 req/s, burst 100).
///
/// Behind a trusted proxy the client IP is taken from forwarding headers,
/// otherwise from the socket peer address, which requires the server to be
/// run with connect info.
pub fn with_global_guard<S>(router: Router<S>, behind_proxy: bool) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if behind_proxy {
        match guard_layer(SmartIpKeyExtractor) {
            Some(layer) => router.layer(layer),
            None => skip_guard(router),
        }
    } else {
        match guard_layer(PeerIpKeyExtractor) {
            Some(layer) => router.layer(layer),
            None => skip_guard(router),
        }
    }
}

/// 2 requests/second per key with bursts of up to 100.
fn guard_layer<K>(extractor: K) -> Option<GovernorLayer<K, NoOpMiddleware<QuantaInstant>, Body>>
where
    K: KeyExtractor,
{
    let config = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .key_extractor(extractor)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

fn skip_guard<S>(router: Router<S>) -> Router<S> {
    warn!("Invalid global rate limit configuration, guard disabled");
    router
}
