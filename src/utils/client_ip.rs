//! Client address extraction for rate limiting.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::SocketAddr;

/// Key used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Returns the first address listed in `X-Forwarded-For`, if any.
///
/// The header may hold a comma-separated chain; the left-most entry is the
/// original client.
pub fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|part| !part.is_empty())
        .map(str::to_string)
}

/// Resolves the client IP for a request.
///
/// `X-Forwarded-For` is trusted only when `behind_proxy` is set; otherwise
/// the socket peer address is used. Falls back to [`UNKNOWN_CLIENT`].
pub fn client_ip<B>(request: &Request<B>, behind_proxy: bool) -> String {
    if behind_proxy {
        if let Some(ip) = forwarded_for(request.headers()) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
