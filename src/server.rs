//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache and task broker setup, worker
//! spawning, and Axum server lifecycle.

use crate::config::Config;
use crate::infrastructure::cache::{CacheService, MemoryCache, RedisCache};
use crate::infrastructure::observability::PrometheusHandle;
use crate::infrastructure::persistence::Repositories;
use crate::infrastructure::tasks::{
    MemoryBroker, RedisBroker, Scheduler, TaskBroker, TaskQueue, spawn_workers,
};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;

/// Opens the PostgreSQL pool with the configured limits.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn connect_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");
    Ok(pool)
}

/// Builds the repositories, running migrations first for PostgreSQL.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn build_repositories(config: &Config) -> Result<Repositories> {
    if config.uses_memory_store() {
        tracing::warn!("Using the in-process store; data is lost on restart");
        return Ok(Repositories::in_memory());
    }

    let pool = connect_pool(config).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations applied");

    Ok(Repositories::postgres(Arc::new(pool)))
}

/// Connects the cache and task broker, sharing one Redis connection.
///
/// Falls back to in-process implementations when Redis is not configured or
/// unreachable. The in-process broker only reaches workers in this process.
async fn connect_backends(config: &Config) -> (Arc<dyn CacheService>, Arc<dyn TaskBroker>) {
    if let Some(redis_url) = &config.redis_url {
        match RedisCache::connect(redis_url, config.cache_ttl_seconds).await {
            Ok(redis) => {
                tracing::info!("Cache and task broker enabled (Redis)");
                let broker = RedisBroker::new(redis.connection());
                return (Arc::new(redis), Arc::new(broker));
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Using in-process backends.", e);
            }
        }
    } else {
        tracing::info!("Redis not configured, using in-process cache and task broker");
    }

    (
        Arc::new(MemoryCache::new(config.cache_ttl_seconds)),
        Arc::new(MemoryBroker::new()),
    )
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool and migrations (or the in-process store)
/// - Redis cache and task broker (or in-process fallbacks)
/// - Task workers for every queue, and the maintenance scheduler
/// - Axum HTTP server with graceful shutdown on Ctrl+C
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config, metrics: Option<Arc<PrometheusHandle>>) -> Result<()> {
    let repositories = build_repositories(&config).await?;
    let (cache, broker) = connect_backends(&config).await;

    let state = AppState::new(
        repositories,
        cache,
        TaskQueue::new(Arc::clone(&broker)),
        config.service_settings()?,
    )?
    .with_metrics(metrics);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut background = spawn_workers(
        Arc::clone(&broker),
        state.task_handler(),
        config.worker_config(),
        shutdown_rx.clone(),
    );
    tracing::info!("Task workers started");

    if config.scheduler_enabled {
        let scheduler = Scheduler::new(
            state.tasks.clone(),
            Scheduler::default_schedules(config.order_pending_ttl_hours),
            shutdown_rx,
        );
        background.push(tokio::spawn(scheduler.run()));
    }

    let app = NormalizePathLayer::trim_trailing_slash().layer(app_router(state));

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped, draining background tasks");
    let _ = shutdown_tx.send(true);
    for handle in background {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
