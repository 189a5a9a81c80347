//! `/api/v1` route configuration.
//!
//! Everything except registration and login requires authentication via
//! [`crate::api::middleware::auth`].

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::api::handlers::{
    bulk_items_handler, bulk_users_handler, cancel_order_handler, create_api_key_handler,
    create_item_handler, create_order_handler, get_item_handler, get_order_handler,
    get_user_handler, list_api_keys_handler, list_items_handler, list_orders_handler,
    list_users_handler, login_handler, me_handler, process_order_handler, register_handler,
    revoke_api_key_handler, update_item_handler, update_me_handler, update_user_handler,
};
use crate::api::middleware::{auth, rate_limit};
use crate::state::AppState;

/// Unauthenticated routes.
///
/// # Endpoints
///
/// - `POST /auth/register` - Create an account
/// - `POST /auth/login`    - Obtain an access token (rate limited per IP)
pub fn public_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_handler))
        .route(
            "/auth/login",
            post(login_handler).route_layer(middleware::from_fn_with_state(
                state,
                rate_limit::login_layer,
            )),
        )
}

/// Routes that require a Bearer token or API key.
///
/// # Endpoints
///
/// - `GET   /auth/api-keys`         - List own API keys
/// - `POST  /auth/api-keys`         - Create an API key
/// - `DELETE /auth/api-keys/{id}`   - Revoke an API key (owner or admin)
/// - `GET   /users/me`              - Current user
/// - `PATCH /users/me`              - Update own profile
/// - `GET   /users`                 - List users (admin)
/// - `POST  /users/bulk`            - Bulk import users (admin)
/// - `GET   /users/{id}`            - Get a user (admin)
/// - `PATCH /users/{id}`            - Update a user (admin)
/// - `GET   /items`                 - List items
/// - `POST  /items`                 - Create an item
/// - `POST  /items/bulk`            - Create items in bulk
/// - `GET   /items/{id}`            - Get an item
/// - `PATCH /items/{id}`            - Update an item (owner or admin)
/// - `GET   /orders`                - List orders
/// - `POST  /orders`                - Place an order
/// - `GET   /orders/{id}`           - Get an order with its lines
/// - `POST  /orders/{id}/cancel`    - Cancel a pending order
/// - `POST  /orders/{id}/process`   - Queue processing (admin)
pub fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/auth/api-keys",
            get(list_api_keys_handler).post(create_api_key_handler),
        )
        .route("/auth/api-keys/{id}", delete(revoke_api_key_handler))
        .route("/users/me", get(me_handler).patch(update_me_handler))
        .route("/users", get(list_users_handler))
        .route("/users/bulk", post(bulk_users_handler))
        .route("/users/{id}", get(get_user_handler).patch(update_user_handler))
        .route("/items", get(list_items_handler).post(create_item_handler))
        .route("/items/bulk", post(bulk_items_handler))
        .route("/items/{id}", get(get_item_handler).patch(update_item_handler))
        .route("/orders", get(list_orders_handler).post(create_order_handler))
        .route("/orders/{id}", get(get_order_handler))
        .route("/orders/{id}/cancel", post(cancel_order_handler))
        .route("/orders/{id}/process", post(process_order_handler))
        .route_layer(middleware::from_fn_with_state(state, auth::layer))
}
