//! Shared application state injected into every handler.

use jsonwebtoken::Algorithm;
use serde_json::json;
use std::sync::Arc;

use crate::application::memoize::Memoizer;
use crate::application::security::{ApiKeyHasher, TokenCodec};
use crate::application::services::{AuthService, ItemService, OrderService, UserService};
use crate::application::tasks::AppTaskHandler;
use crate::domain::tasks::TaskHandler;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::observability::PrometheusHandle;
use crate::infrastructure::persistence::Repositories;
use crate::infrastructure::tasks::TaskQueue;

/// Fixed-window request limits.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Login attempts allowed per client IP in one window.
    pub login_per_minute: u64,
    /// API requests allowed per authenticated user in one window.
    pub authenticated_per_minute: u64,
    /// API requests allowed per client IP without valid credentials.
    pub anonymous_per_minute: u64,
    /// Trust `X-Forwarded-For` when resolving the client IP.
    pub behind_proxy: bool,
    /// Per-IP token bucket in front of every route. Needs the peer address,
    /// so it only works when served with connect info.
    pub global_guard: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            login_per_minute: 5,
            authenticated_per_minute: 100,
            anonymous_per_minute: 10,
            behind_proxy: false,
            global_guard: true,
        }
    }
}

/// Secrets and tunables the services are built from.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_expire_minutes: i64,
    pub api_key_secret: String,
    pub cache_ttl_seconds: u64,
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitSettings,
}

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub item_service: Arc<ItemService>,
    pub order_service: Arc<OrderService>,
    pub repositories: Repositories,
    pub cache: Arc<dyn CacheService>,
    pub tasks: TaskQueue,
    pub settings: Arc<ServiceSettings>,
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Wires the services on top of the given stores.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the API key secret cannot key an HMAC.
    pub fn new(
        repositories: Repositories,
        cache: Arc<dyn CacheService>,
        tasks: TaskQueue,
        settings: ServiceSettings,
    ) -> Result<Self, AppError> {
        let tokens = TokenCodec::new(
            &settings.jwt_secret,
            settings.jwt_algorithm,
            settings.access_token_expire_minutes,
        );
        let hasher = ApiKeyHasher::new(&settings.api_key_secret).map_err(|e| {
            AppError::internal("Invalid API key secret", json!({ "reason": e.to_string() }))
        })?;
        let memo = Memoizer::new(Arc::clone(&cache), settings.cache_ttl_seconds);

        Ok(Self {
            user_service: Arc::new(UserService::new(Arc::clone(&repositories.users))),
            auth_service: Arc::new(AuthService::new(
                Arc::clone(&repositories.users),
                Arc::clone(&repositories.api_keys),
                tokens,
                hasher,
            )),
            item_service: Arc::new(ItemService::new(Arc::clone(&repositories.items), memo)),
            order_service: Arc::new(OrderService::new(
                Arc::clone(&repositories.orders),
                Arc::clone(&repositories.items),
                tasks.clone(),
            )),
            repositories,
            cache,
            tasks,
            settings: Arc::new(settings),
            metrics: None,
        })
    }

    /// Attaches the Prometheus handle rendered by `GET /metrics`.
    pub fn with_metrics(mut self, handle: Option<Arc<PrometheusHandle>>) -> Self {
        self.metrics = handle;
        self
    }

    /// Handler that executes background tasks against these services.
    pub fn task_handler(&self) -> Arc<dyn TaskHandler> {
        Arc::new(AppTaskHandler::new(
            Arc::clone(&self.user_service),
            Arc::clone(&self.order_service),
        ))
    }
}
