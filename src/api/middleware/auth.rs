//! Authentication middleware for Bearer tokens and API keys.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;
use serde_json::json;

use crate::domain::entities::User;
use crate::{error::AppError, state::AppState};

/// Header carrying a raw API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated caller, inserted by [`layer`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Authenticates requests using either header:
///
/// ```text
/// Authorization: Bearer <jwt>
/// X-API-Key: <key>
/// ```
///
/// An API key takes precedence when both are present. The resolved user is
/// stored as a [`CurrentUser`] request extension. A user already resolved
/// by the API rate limiter is reused.
///
/// # Errors
///
/// Returns `401 Unauthorized` when no credentials are supplied or they are
/// invalid or expired, and `403 Forbidden` when the user is inactive.
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let user = match parts.extensions.get::<CurrentUser>() {
        Some(CurrentUser(user)) => user.clone(),
        None => authenticate(&st, &mut parts).await?,
    };

    tracing::Span::current().record("user_id", user.id);
    parts.extensions.insert(CurrentUser(user));

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Resolves the request's credentials to an active user.
pub async fn authenticate(st: &AppState, parts: &mut Parts) -> Result<User, AppError> {
    match api_key(&parts.headers) {
        Some(raw_key) => st.auth_service.resolve_api_key(&raw_key).await,
        None => {
            let AuthBearer(token) = AuthBearer::from_request_parts(parts, &())
                .await
                .map_err(|_| missing_credentials())?;
            st.auth_service.resolve_bearer(&token).await
        }
    }
}

/// Whether the request carries an API key or an `Authorization` header.
pub fn has_credentials(headers: &HeaderMap) -> bool {
    api_key(headers).is_some() || headers.contains_key(header::AUTHORIZATION)
}

fn api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn missing_credentials() -> AppError {
    AppError::unauthorized(
        "Unauthorized",
        json!({ "reason": "Authorization header is missing or invalid" }),
    )
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(missing_credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_api_key_header_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("  imk_abc "));
        assert_eq!(api_key(&headers).as_deref(), Some("imk_abc"));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("   "));
        assert!(api_key(&headers).is_none());
    }

    #[test]
    fn test_has_credentials() {
        let mut headers = HeaderMap::new();
        assert!(!has_credentials(&headers));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static(" "));
        assert!(!has_credentials(&headers));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert!(has_credentials(&headers));
    }

    #[tokio::test]
    async fn test_current_user_missing_is_unauthorized() {
        let (mut parts, _) = Request::new(axum::body::Body::empty()).into_parts();
        let result = CurrentUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized { .. })));
    }
}
