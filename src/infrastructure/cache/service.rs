//! Cache service trait and error types.

use async_trait::async_trait;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    ConnectionError(String),
    #[error("Cache operation error: {0}")]
    OperationError(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key/value cache with TTL expiry and fixed-window counters.
///
/// Reads and writes are fail-open: a broken backend behaves like an empty
/// cache and never disrupts the request. Counters report errors so the
/// caller can decide how to degrade.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process cache used without Redis
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Returns the cached value, or `Ok(None)` on a miss or backend error.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores a value. `ttl_seconds = None` uses the backend's default TTL.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()>;

    /// Removes a cached value.
    async fn invalidate(&self, key: &str) -> CacheResult<()>;

    /// Increments the counter at `key` and returns the new count.
    ///
    /// The first increment starts a window of `window_seconds`; the counter
    /// disappears when the window ends.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::OperationError`] if the backend fails.
    async fn increment(&self, key: &str, window_seconds: u64) -> CacheResult<u64>;

    /// Checks if the cache backend is healthy.
    async fn health_check(&self) -> bool;

    /// Backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;
}
