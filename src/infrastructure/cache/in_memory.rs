//! Process-local `CacheStore` on top of moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;

use crate::domain::cache::{glob_to_regex, CacheStore};
use crate::domain::DomainError;

/// Bounds for the local cache
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryCacheConfig {
    /// Entry count above which moka starts evicting
    pub max_capacity: u64,
    /// Evicts entries left unread this long, even before their TTL
    pub time_to_idle: Option<Duration>,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_idle: None,
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, entries: u64) -> Self {
        self.max_capacity = entries;
        self
    }

    pub fn with_time_to_idle(mut self, idle: Duration) -> Self {
        self.time_to_idle = Some(idle);
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: String,
    /// TTL requested at write time
    ttl: Duration,
    /// Monotonic expiration instant
    expires_at: Instant,
}

impl CacheEntry {
    fn new(data: &str, ttl: Duration) -> Self {
        Self {
            data: data.to_string(),
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Hands each entry's own TTL to moka so eviction follows the write-time TTL
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Local cache for single-process deployments and tests
///
/// Every entry keeps the TTL it was written with, at millisecond precision.
/// Reads check the expiry instant themselves, so an entry is never served
/// past its TTL even while moka's eviction lags behind.
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    config: InMemoryCacheConfig,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let builder = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryTtl);

        let cache = match config.time_to_idle {
            Some(idle) => builder.time_to_idle(idle).build(),
            None => builder.build(),
        };

        Self {
            cache,
            config,
        }
    }

    pub fn config(&self) -> &InMemoryCacheConfig {
        &self.config
    }

    async fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.cache.get(key).await?;

        if entry.is_expired() {
            self.cache.invalidate(key).await;
            return None;
        }

        Some(entry)
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.live_entry(key).await.map(|entry| entry.data))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        self.cache
            .insert(key.to_string(), CacheEntry::new(value, ttl))
            .await;
        Ok(())
    }

    async fn set_raw_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, DomainError> {
        // An entry past its own expiry counts as absent even before moka evicts it
        let outcome = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|current| {
                let live = current.is_some_and(|entry| !entry.value().is_expired());
                let op = if live {
                    Op::Nop
                } else {
                    Op::Put(CacheEntry::new(value, ttl))
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(
            outcome,
            CompResult::Inserted(_) | CompResult::ReplacedWith(_)
        ))
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self
            .cache
            .remove(key)
            .await
            .is_some_and(|entry| !entry.is_expired()))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DomainError> {
        let regex = glob_to_regex(pattern)?;

        Ok(self
            .cache
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && regex.is_match(key))
            .map(|(key, _)| key.as_ref().clone())
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        Ok(self
            .live_entry(key)
            .await
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now())))
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }

    async fn clear_all(&self) -> Result<usize, DomainError> {
        let removed = self.keys("*").await?.len();

        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;

        tracing::info!(removed, "Cleared in-memory cache");
        Ok(removed)
    }
}
