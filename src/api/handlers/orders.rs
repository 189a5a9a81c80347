//! Handlers for order endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use crate::api::dto::order::{
    CreateOrderRequest, OrderListQuery, OrderResponse, ProcessOrderResponse,
};
use crate::api::dto::pagination::PageResponse;
use crate::api::extract::{ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Lists orders. Regular users only see their own; admins see all orders
/// and may filter by `owner_id`.
///
/// # Endpoint
///
/// `GET /api/v1/orders?status=pending&skip=0&limit=100`
pub async fn list_orders_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidQuery(query): ValidQuery<OrderListQuery>,
) -> Result<Json<PageResponse<OrderResponse>>, AppError> {
    let request = query.pagination.to_page_request()?;
    let page = state
        .order_service
        .list(&user, request, query.filter())
        .await?;

    Ok(Json(PageResponse::from_page(page, request, OrderResponse::from)))
}

/// Places an order.
///
/// # Endpoint
///
/// `POST /api/v1/orders`
///
/// # Request Body
///
/// ```json
/// { "items": [ { "item_id": 1, "quantity": 2 } ] }
/// ```
///
/// Unit prices are taken from the items at the time of ordering.
///
/// # Errors
///
/// - **404 Not Found**: one or more items do not exist
/// - **422 Unprocessable Entity**: no lines, duplicate items or a quantity
///   outside `1..=100`
pub async fn create_order_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let order = state
        .order_service
        .create(&user, payload.into_lines())
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// `GET /api/v1/orders/{id}`. Owner or admin only; includes the lines.
pub async fn get_order_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.order_service.get(&user, id).await?;
    Ok(Json(order.into()))
}

/// `POST /api/v1/orders/{id}/cancel`. Only pending orders can be cancelled.
pub async fn cancel_order_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.order_service.cancel(&user, id).await?;
    Ok(Json(order.into()))
}

/// Queues a pending order for background processing. Admin only.
///
/// # Endpoint
///
/// `POST /api/v1/orders/{id}/process`
///
/// # Response
///
/// **202 Accepted**
///
/// ```json
/// { "task_id": "9f1c2b...", "task": "process_order", "status": "queued" }
/// ```
pub async fn process_order_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<(StatusCode, Json<ProcessOrderResponse>), AppError> {
    let envelope = state.order_service.request_processing(&user, id).await?;
    Ok((StatusCode::ACCEPTED, Json(envelope.into())))
}
