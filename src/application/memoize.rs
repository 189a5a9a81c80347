//! Read-through memoization on top of [`CacheService`].
//!
//! Results are stored as JSON under `cache:{function}:{digest}`, where the
//! digest is the SHA-256 of the JSON-encoded arguments. Entries expire after
//! the configured TTL; writes elsewhere do not invalidate them unless the
//! caller does so explicitly.

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::infrastructure::cache::CacheService;

#[derive(Clone)]
pub struct Memoizer {
    cache: Arc<dyn CacheService>,
    ttl_seconds: u64,
}

impl Memoizer {
    pub fn new(cache: Arc<dyn CacheService>, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    /// Cache key for a call of `function` with `args`.
    ///
    /// Returns `None` if the arguments cannot be encoded.
    pub fn key<A: Serialize + ?Sized>(function: &str, args: &A) -> Option<String> {
        let encoded = serde_json::to_vec(args).ok()?;
        let digest = Sha256::digest(&encoded);
        Some(format!("cache:{}:{}", function, hex::encode(digest)))
    }

    /// Returns the cached result for `(function, args)` or runs `compute` and
    /// caches its successful result.
    ///
    /// Errors are never cached. A broken cache only costs the extra compute.
    pub async fn get_or_compute<T, A, F, Fut>(
        &self,
        function: &'static str,
        args: &A,
        compute: F,
    ) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let Some(key) = Self::key(function, args) else {
            return compute().await;
        };

        if let Ok(Some(cached)) = self.cache.get(&key).await {
            match serde_json::from_str::<T>(&cached) {
                Ok(value) => {
                    counter!("cache_hits_total", "function" => function).increment(1);
                    debug!(function, key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(function, error = %e, "Discarding undecodable cache entry"),
            }
        }

        counter!("cache_misses_total", "function" => function).increment(1);
        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(encoded) => {
                if let Err(e) = self.cache.set(&key, &encoded, Some(self.ttl_seconds)).await {
                    warn!(function, error = %e, "Failed to store cache entry");
                }
            }
            Err(e) => warn!(function, error = %e, "Failed to encode cache entry"),
        }

        Ok(value)
    }

    /// Drops the cached result for `(function, args)`; failures are only logged.
    pub async fn invalidate<A: Serialize + ?Sized>(&self, function: &str, args: &A) {
        let Some(key) = Self::key(function, args) else {
            return;
        };
        if let Err(e) = self.cache.invalidate(&key).await {
            warn!(function, error = %e, "Failed to invalidate cache entry");
        }
    }
}
