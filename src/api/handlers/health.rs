//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "postgres connected" },
///     "cache": { "status": "ok", "message": "redis connected" },
///     "task_broker": { "status": "ok", "message": "redis connected" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let (database, cache, task_broker) = tokio::join!(
        check_database(&state),
        check_cache(&state),
        check_task_broker(&state),
    );

    let all_healthy = database.is_ok() && cache.is_ok() && task_broker.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            cache,
            task_broker,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    let backend = state.repositories.backend();
    match state.repositories.ping().await {
        Ok(()) => CheckStatus::ok(format!("{} connected", backend)),
        Err(e) => CheckStatus::error(format!("Database error: {}", e)),
    }
}

async fn check_cache(state: &AppState) -> CheckStatus {
    let backend = state.cache.backend();
    if state.cache.health_check().await {
        CheckStatus::ok(format!("{} connected", backend))
    } else {
        CheckStatus::error(format!("{} connection failed", backend))
    }
}

async fn check_task_broker(state: &AppState) -> CheckStatus {
    let broker = state.tasks.broker();
    if broker.health_check().await {
        CheckStatus::ok(format!("{} connected", broker.backend()))
    } else {
        CheckStatus::error(format!("{} connection failed", broker.backend()))
    }
}
