//! Redis-backed cache implementation.

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, error, info, warn};

/// Redis cache with a shared key namespace.
///
/// Uses `ConnectionManager` for connection reuse and reconnects. Reads and
/// writes are fail-open: errors are logged but don't propagate to callers.
pub struct RedisCache {
    client: ConnectionManager,
    default_ttl: u64,
    key_prefix: String,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// `default_ttl_seconds` applies when [`CacheService::set`] is called
    /// without a TTL; it is controlled via `CACHE_TTL_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ConnectionError`] if the URL is invalid, the connection cannot
    /// be established, or the PING health check fails.
    pub async fn connect(redis_url: &str, default_ttl_seconds: u64) -> CacheResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis");

        Ok(Self {
            client: manager,
            default_ttl: default_ttl_seconds,
            key_prefix: "imangor:".to_string(),
        })
    }

    /// Shared connection, reused by the task broker.
    pub fn connection(&self) -> ConnectionManager {
        self.client.clone()
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

/// `MULTI; SET key 0 EX window NX; INCR key; EXEC`.
///
/// The window TTL is attached when the counter is created, so a counter
/// never outlives its window even if the client drops mid-request.
fn window_counter(key: &str, window_seconds: u64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window_seconds.max(1))
        .arg("NX")
        .ignore()
        .incr(key, 1u64);
    pipe
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let full_key = self.build_key(key);
        let mut conn = self.client.clone();

        match conn.get::<_, Option<String>>(&full_key).await {
            Ok(value) => {
                debug!(key, hit = value.is_some(), "Cache GET");
                Ok(value)
            }
            Err(e) => {
                error!(key, error = %e, "Redis GET error");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()> {
        let full_key = self.build_key(key);
        let mut conn = self.client.clone();
        let ttl = ttl_seconds.unwrap_or(self.default_ttl);

        if let Err(e) = conn.set_ex::<_, _, ()>(&full_key, value, ttl).await {
            warn!(key, error = %e, "Redis SET error");
        } else {
            debug!(key, ttl, "Cache SET");
        }
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> CacheResult<()> {
        let full_key = self.build_key(key);
        let mut conn = self.client.clone();

        match conn.del::<_, i32>(&full_key).await {
            Ok(deleted) => {
                if deleted > 0 {
                    debug!(key, "Cache INVALIDATE");
                }
            }
            Err(e) => warn!(key, error = %e, "Redis DEL error"),
        }
        Ok(())
    }

    async fn increment(&self, key: &str, window_seconds: u64) -> CacheResult<u64> {
        let full_key = self.build_key(key);
        let mut conn = self.client.clone();

        let (count,): (u64,) = window_counter(&full_key, window_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::OperationError(format!("INCR failed: {}", e)))?;

        Ok(count)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(key: &str, window: u64) -> String {
        String::from_utf8_lossy(&window_counter(key, window).get_packed_pipeline()).into_owned()
    }

    #[test]
    fn test_window_counter_sets_ttl_and_increments_in_one_transaction() {
        let wire = packed("imangor:rate_limit:login:1.2.3.4", 60);

        let multi = wire.find("MULTI").expect("MULTI");
        let set = wire.find("SET").expect("SET");
        let incr = wire.find("INCR").expect("INCR");
        let exec = wire.find("EXEC").expect("EXEC");
        assert!(multi < set && set < incr && incr < exec);

        assert!(wire.contains("NX"));
        assert!(wire.contains("EX\r\n$2\r\n60\r\n"));
        assert!(!wire.contains("EXPIRE"));
    }

    #[test]
    fn test_window_counter_never_sends_a_zero_ttl() {
        let wire = packed("k", 0);
        assert!(wire.contains("EX\r\n$1\r\n1\r\n"));
    }
}
