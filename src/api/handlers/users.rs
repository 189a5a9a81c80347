//! Handlers for the caller's profile and user administration.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use crate::api::dto::pagination::PageResponse;
use crate::api::dto::user::{
    AdminUpdateUserRequest, BulkUsersRequest, UpdateMeRequest, UserListQuery, UserResponse,
};
use crate::api::extract::{ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::application::permissions::require_admin;
use crate::application::services::Registration;
use crate::error::AppError;
use crate::state::AppState;

/// `GET /api/v1/users/me`
pub async fn me_handler(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

/// `PATCH /api/v1/users/me`
///
/// Updates `full_name` and/or `password`. Roles and activation are admin only.
pub async fn update_me_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<UpdateMeRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let updated = state.user_service.update(user.id, payload.into()).await?;
    Ok(Json(updated.into()))
}

/// Lists users with offset pagination. Admin only.
///
/// # Endpoint
///
/// `GET /api/v1/users?skip=0&limit=100&is_active=true`
pub async fn list_users_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidQuery(query): ValidQuery<UserListQuery>,
) -> Result<Json<PageResponse<UserResponse>>, AppError> {
    require_admin(&user)?;

    let request = query.pagination.to_page_request()?;
    let page = state.user_service.list(request, query.filter()).await?;

    Ok(Json(PageResponse::from_page(page, request, UserResponse::from)))
}

/// Imports users in one batch. Admin only.
///
/// # Endpoint
///
/// `POST /api/v1/users/bulk`
///
/// The batch is all-or-nothing: a duplicate email fails the whole import.
pub async fn bulk_users_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<BulkUsersRequest>,
) -> Result<(StatusCode, Json<Vec<UserResponse>>), AppError> {
    require_admin(&user)?;

    let registrations = payload.users.into_iter().map(Registration::from).collect();
    let users = state.user_service.bulk_register(registrations).await?;

    tracing::info!(count = users.len(), "Users imported");
    Ok((
        StatusCode::CREATED,
        Json(users.into_iter().map(UserResponse::from).collect()),
    ))
}

/// `GET /api/v1/users/{id}`. Admin only.
pub async fn get_user_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<UserResponse>, AppError> {
    require_admin(&user)?;
    let found = state.user_service.get(id).await?;
    Ok(Json(found.into()))
}

/// `PATCH /api/v1/users/{id}`. Admin only; may change `is_active` and `roles`.
pub async fn update_user_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<AdminUpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    require_admin(&user)?;
    let updated = state.user_service.update(id, payload.into()).await?;
    Ok(Json(updated.into()))
}
