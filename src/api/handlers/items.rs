//! Handlers for item endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use crate::api::dto::item::{
    BulkItemsRequest, CreateItemRequest, ItemListQuery, ItemResponse, UpdateItemRequest,
};
use crate::api::dto::pagination::PageResponse;
use crate::api::extract::{ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::application::services::ItemDraft;
use crate::error::AppError;
use crate::state::AppState;

/// Lists items, optionally filtered by `owner_id`.
///
/// # Endpoint
///
/// `GET /api/v1/items?skip=0&limit=100&owner_id=1`
///
/// Pages are cached for the configured TTL, so newly created items may take
/// up to that long to appear.
pub async fn list_items_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
    ValidQuery(query): ValidQuery<ItemListQuery>,
) -> Result<Json<PageResponse<ItemResponse>>, AppError> {
    let request = query.pagination.to_page_request()?;
    let page = state.item_service.list(request, query.filter()).await?;

    Ok(Json(PageResponse::from_page(page, request, ItemResponse::from)))
}

/// `POST /api/v1/items`. The caller becomes the owner.
pub async fn create_item_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), AppError> {
    let item = state.item_service.create(&user, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// `POST /api/v1/items/bulk`
pub async fn bulk_items_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<BulkItemsRequest>,
) -> Result<(StatusCode, Json<Vec<ItemResponse>>), AppError> {
    let drafts = payload.items.into_iter().map(ItemDraft::from).collect();
    let items = state.item_service.bulk_create(&user, drafts).await?;

    Ok((
        StatusCode::CREATED,
        Json(items.into_iter().map(ItemResponse::from).collect()),
    ))
}

/// `GET /api/v1/items/{id}`
pub async fn get_item_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<ItemResponse>, AppError> {
    let item = state.item_service.get(id).await?;
    Ok(Json(item.into()))
}

/// `PATCH /api/v1/items/{id}`. Owner or admin only.
pub async fn update_item_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, AppError> {
    let item = state.item_service.update(&user, id, payload.into()).await?;
    Ok(Json(item.into()))
}
