//! Handlers for registration, login and API key management.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::auth::{
    ApiKeyCreatedResponse, ApiKeyResponse, CreateApiKeyRequest, LoginRequest, RegisterRequest,
    TokenResponse,
};
use crate::api::dto::user::UserResponse;
use crate::api::extract::{ValidJson, ValidPath};
use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Registers a user with the `user` role.
///
/// # Endpoint
///
/// `POST /api/v1/auth/register`
///
/// # Errors
///
/// - **409 Conflict**: email already registered
/// - **422 Unprocessable Entity**: invalid email or password length
pub async fn register_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.user_service.register(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchanges email and password for a JWT access token.
///
/// # Endpoint
///
/// `POST /api/v1/auth/login`
///
/// Rate limited per client IP (see
/// [`crate::api::middleware::rate_limit::login_layer`]).
///
/// # Response
///
/// ```json
/// { "access_token": "eyJ...", "token_type": "bearer", "expires_in": 1800 }
/// ```
pub async fn login_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(token.into()))
}

/// Creates an API key for the caller. The raw key is only returned here.
///
/// # Endpoint
///
/// `POST /api/v1/auth/api-keys`
pub async fn create_api_key_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyCreatedResponse>), AppError> {
    let created = state.auth_service.create_api_key(&user, payload.name).await?;
    tracing::info!(user_id = user.id, key_id = created.key.id, "API key created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Lists the caller's API keys, revoked ones included.
///
/// # Endpoint
///
/// `GET /api/v1/auth/api-keys`
pub async fn list_api_keys_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = state.auth_service.list_api_keys(&user).await?;
    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// Revokes an API key. Requests carrying it are rejected from then on.
///
/// # Endpoint
///
/// `DELETE /api/v1/auth/api-keys/{id}`
///
/// # Errors
///
/// - **403 Forbidden**: the key belongs to someone else and the caller is not an admin
/// - **404 Not Found**: no such key
pub async fn revoke_api_key_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let key = state.auth_service.revoke_api_key(&user, id).await?;
    Ok(Json(key.into()))
}
