#![allow(dead_code)]

use axum_test::TestServer;
use imangor::application::services::Registration;
use imangor::domain::entities::{Role, User};
use imangor::infrastructure::cache::MemoryCache;
use imangor::infrastructure::observability::{PrometheusHandle, init_metrics_handle};
use imangor::infrastructure::persistence::Repositories;
use imangor::infrastructure::tasks::{MemoryBroker, TaskBroker, TaskQueue};
use imangor::routes::app_router;
use imangor::state::{AppState, RateLimitSettings, ServiceSettings};
use jsonwebtoken::Algorithm;
use serde_json::json;
use std::sync::{Arc, OnceLock};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const API_KEY_SECRET: &str = "test-api-key-secret";
pub const PASSWORD: &str = "correct-horse-battery";

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        jwt_secret: JWT_SECRET.to_string(),
        jwt_algorithm: Algorithm::HS256,
        access_token_expire_minutes: 30,
        api_key_secret: API_KEY_SECRET.to_string(),
        cache_ttl_seconds: 60,
        cors_origins: vec!["https://app.example.com".to_string()],
        rate_limit: RateLimitSettings {
            global_guard: false,
            authenticated_per_minute: 1_000,
            anonymous_per_minute: 1_000,
            ..Default::default()
        },
    }
}

/// One recorder per test binary; installing a second one fails.
fn metrics() -> Option<Arc<PrometheusHandle>> {
    static HANDLE: OnceLock<Option<Arc<PrometheusHandle>>> = OnceLock::new();
    HANDLE.get_or_init(init_metrics_handle).clone()
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub broker: Arc<dyn TaskBroker>,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(settings())
}

pub fn spawn_app_with(settings: ServiceSettings) -> TestApp {
    let broker: Arc<dyn TaskBroker> = Arc::new(MemoryBroker::new());
    let state = AppState::new(
        Repositories::in_memory(),
        Arc::new(MemoryCache::new(settings.cache_ttl_seconds)),
        TaskQueue::new(Arc::clone(&broker)),
        settings,
    )
    .unwrap()
    .with_metrics(metrics());

    let server = TestServer::new(app_router(state.clone())).unwrap();

    TestApp {
        server,
        state,
        broker,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

impl TestApp {
    /// Registers a user directly through the service and returns a valid token.
    pub async fn create_user(&self, email: &str, roles: Vec<Role>) -> (User, String) {
        let user = self
            .state
            .user_service
            .register_with_roles(
                Registration {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    full_name: None,
                },
                roles,
            )
            .await
            .unwrap();
        let token = self.state.auth_service.issue_token(&user).unwrap();
        (user, token.access_token)
    }

    pub async fn user(&self, email: &str) -> (User, String) {
        self.create_user(email, vec![Role::User]).await
    }

    pub async fn admin(&self, email: &str) -> (User, String) {
        self.create_user(email, vec![Role::User, Role::Admin]).await
    }

    /// Creates an item over HTTP and returns its id.
    pub async fn create_item(&self, token: &str, title: &str, price: &str) -> i64 {
        let response = self
            .server
            .post("/api/v1/items")
            .add_header("Authorization", bearer(token))
            .json(&json!({ "title": title, "price": price }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<serde_json::Value>()["id"].as_i64().unwrap()
    }

    /// Creates an API key over HTTP and returns its id and raw key.
    pub async fn create_api_key(&self, token: &str, name: &str) -> (i64, String) {
        let response = self
            .server
            .post("/api/v1/auth/api-keys")
            .add_header("Authorization", bearer(token))
            .json(&json!({ "name": name }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body = response.json::<serde_json::Value>();
        (
            body["id"].as_i64().unwrap(),
            body["key"].as_str().unwrap().to_string(),
        )
    }

    /// Places an order over HTTP and returns its id.
    pub async fn create_order(&self, token: &str, lines: serde_json::Value) -> i64 {
        let response = self
            .server
            .post("/api/v1/orders")
            .add_header("Authorization", bearer(token))
            .json(&json!({ "items": lines }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<serde_json::Value>()["id"].as_i64().unwrap()
    }
}
