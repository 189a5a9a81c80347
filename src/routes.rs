//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET /health`  - Health check: database, cache, task broker (public)
//! - `GET /metrics` - Prometheus metrics (public)
//! - `/api/v1/*`    - REST API, limited per user or per anonymous IP
//!
//! # Middleware (outermost first)
//!
//! - **Request id** - `x-request-id` generated and echoed back
//! - **Tracing** - Structured request/response logging
//! - **Security headers / CORS**
//! - **Rate limiting** - Optional per-IP token bucket
//! - **Metrics** - Request counter and latency histogram per route

use axum::http::{HeaderName, Uri};
use axum::routing::get;
use axum::{Router, middleware};
use serde_json::json;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::api;
use crate::api::handlers::{health_handler, metrics_handler};
use crate::api::middleware::{metrics, rate_limit, security, tracing};
use crate::error::AppError;
use crate::state::AppState;

/// Constructs the application router with all routes and middleware.
///
/// Trailing-slash normalization is applied by the server around this router.
pub fn app_router(state: AppState) -> Router {
    let settings = state.settings.clone();
    let request_id = HeaderName::from_static("x-request-id");

    let api_router = Router::new()
        .merge(api::routes::public_routes(state.clone()))
        .merge(api::routes::protected_routes(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::request_layer,
        ));

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_router)
        .route_layer(middleware::from_fn(metrics::layer))
        .fallback(route_not_found)
        .with_state(state);

    let router = if settings.rate_limit.global_guard {
        rate_limit::with_global_guard(router, settings.rate_limit.behind_proxy)
    } else {
        router
    };

    security::with_security_headers(router)
        .layer(security::cors_layer(&settings.cors_origins))
        .layer(tracing::layer())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::not_found("Route not found", json!({ "path": uri.path() }))
}
