//! In-process cache used when Redis is not configured.

use super::service::{CacheResult, CacheService};
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
enum Slot {
    Text(String),
    Counter(u64),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    /// Lifetime starting at this write; `None` keeps the current deadline.
    ttl: Option<Duration>,
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl.or(duration_until_expiry)
    }
}

/// Cache backed by `moka` with per-entry TTLs.
///
/// Mirrors the Redis semantics closely enough for single-process
/// deployments and tests: values expire after their TTL and counters reset
/// when their window ends.
pub struct MemoryCache {
    cache: Cache<String, Entry>,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(default_ttl_seconds: u64) -> Self {
        debug!("Using in-memory cache");
        Self {
            cache: Cache::builder()
                .max_capacity(10_000)
                .expire_after(EntryExpiry)
                .build(),
            default_ttl: Duration::from_secs(default_ttl_seconds),
        }
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(match self.cache.get(key).await {
            Some(Entry {
                slot: Slot::Text(value),
                ..
            }) => Some(value),
            Some(Entry {
                slot: Slot::Counter(count),
                ..
            }) => Some(count.to_string()),
            None => None,
        })
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()> {
        let ttl = ttl_seconds.map_or(self.default_ttl, Duration::from_secs);
        self.cache
            .insert(
                key.to_string(),
                Entry {
                    slot: Slot::Text(value.to_string()),
                    ttl: Some(ttl),
                },
            )
            .await;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn increment(&self, key: &str, window_seconds: u64) -> CacheResult<u64> {
        let window = Duration::from_secs(window_seconds);
        let entry = self
            .cache
            .entry(key.to_string())
            .and_upsert_with(|existing| {
                let next = match existing.map(|e| e.into_value()) {
                    Some(Entry {
                        slot: Slot::Counter(count),
                        ..
                    }) => Entry {
                        slot: Slot::Counter(count + 1),
                        ttl: None,
                    },
                    _ => Entry {
                        slot: Slot::Counter(1),
                        ttl: Some(window),
                    },
                };
                std::future::ready(next)
            })
            .await;

        match entry.into_value().slot {
            Slot::Counter(count) => Ok(count),
            Slot::Text(_) => Ok(1),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
