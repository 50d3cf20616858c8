//! Redis-backed `CacheStore`

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use crate::domain::cache::CacheStore;
use crate::domain::DomainError;

/// Connection and keyspace settings
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    pub url: String,
    /// Namespace prepended as `<prefix>:` to every key
    pub key_prefix: Option<String>,
    /// COUNT hint per SCAN call, also the DEL batch size
    pub scan_count: usize,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            scan_count: 100,
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the namespace; glob metacharacters are rejected
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Result<Self, DomainError> {
        let prefix = prefix.into();
        validate_key_prefix(&prefix)?;

        self.key_prefix = Some(prefix);
        Ok(self)
    }

    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }
}

/// A prefix ends up inside SCAN MATCH patterns, so it must match only itself
fn validate_key_prefix(prefix: &str) -> Result<(), DomainError> {
    if prefix.is_empty() {
        return Err(DomainError::configuration("Redis key prefix must not be empty"));
    }

    if let Some(bad) = prefix.chars().find(|c| matches!(c, '*' | '?' | '[' | ']' | '\\')) {
        return Err(DomainError::configuration(format!(
            "Redis key prefix '{}' contains glob character '{}'",
            prefix, bad
        )));
    }

    Ok(())
}

/// PSETEX and SET PX reject 0
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Maps logical keys onto the shared Redis keyspace
#[derive(Debug, Clone, Default, PartialEq)]
struct Namespace(Option<String>);

impl Namespace {
    fn apply(&self, key: &str) -> String {
        match &self.0 {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Inverse of `apply`; keys outside the namespace come back untouched
    fn strip(&self, key: String) -> String {
        let Some(prefix) = &self.0 else {
            return key;
        };

        match key.strip_prefix(prefix.as_str()).and_then(|rest| rest.strip_prefix(':')) {
            Some(logical) => logical.to_string(),
            None => key,
        }
    }

    fn is_scoped(&self) -> bool {
        self.0.is_some()
    }
}

fn failure(action: &str, target: &str, e: RedisError) -> DomainError {
    DomainError::cache(format!("Redis {} '{}' failed: {}", action, target, e))
}

/// `CacheStore` over a multiplexed Redis connection
///
/// TTLs are written with PSETEX and read with PTTL, so millisecond TTLs
/// survive. Pattern operations walk the keyspace with SCAN, never KEYS.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    namespace: Namespace,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("url", &self.config.url)
            .field("namespace", &self.namespace.0)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connects eagerly; the manager reconnects on its own afterwards
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        if let Some(prefix) = &config.key_prefix {
            validate_key_prefix(prefix)?;
        }

        let client = Client::open(config.url.as_str())
            .map_err(|e| failure("open", &config.url, e))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| failure("connect", &config.url, e))?;

        Ok(Self {
            connection,
            namespace: Namespace(config.key_prefix.clone()),
            config,
        })
    }

    pub fn config(&self) -> &RedisCacheConfig {
        &self.config
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }

    /// Physical keys matching a logical glob, deduplicated
    async fn scan_physical(&self, pattern: &str) -> Result<Vec<String>, DomainError> {
        let physical_pattern = self.namespace.apply(pattern);
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&physical_pattern)
                .arg("COUNT")
                .arg(self.config.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| failure("scan", pattern, e))?;

            found.extend(batch);
            cursor = next;

            if cursor == 0 {
                break;
            }
        }

        // SCAN may yield a key more than once
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        self.conn()
            .get(self.namespace.apply(key))
            .await
            .map_err(|e| failure("get", key, e))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        redis::cmd("PSETEX")
            .arg(self.namespace.apply(key))
            .arg(ttl_millis(ttl))
            .arg(value)
            .query_async::<()>(&mut self.conn())
            .await
            .map_err(|e| failure("set", key, e))
    }

    async fn set_raw_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, DomainError> {
        // OK when written, nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.namespace.apply(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .arg("NX")
            .query_async(&mut self.conn())
            .await
            .map_err(|e| failure("set if absent", key, e))?;

        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let removed: u64 = self
            .conn()
            .del(self.namespace.apply(key))
            .await
            .map_err(|e| failure("delete", key, e))?;

        Ok(removed > 0)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DomainError> {
        let physical = self.scan_physical(pattern).await?;
        Ok(physical
            .into_iter()
            .map(|key| self.namespace.strip(key))
            .collect())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        let physical = self.scan_physical(pattern).await?;
        let mut conn = self.conn();
        let mut removed = 0usize;

        for batch in physical.chunks(self.config.scan_count) {
            let count: usize = conn
                .del(batch)
                .await
                .map_err(|e| failure("delete pattern", pattern, e))?;
            removed += count;
        }

        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        self.conn()
            .exists(self.namespace.apply(key))
            .await
            .map_err(|e| failure("exists", key, e))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        let millis: i64 = self
            .conn()
            .pttl(self.namespace.apply(key))
            .await
            .map_err(|e| failure("pttl", key, e))?;

        // -2: no such key, -1: no expiry
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    async fn size(&self) -> Result<usize, DomainError> {
        if self.namespace.is_scoped() {
            return Ok(self.scan_physical("*").await?.len());
        }

        redis::cmd("DBSIZE")
            .query_async::<usize>(&mut self.conn())
            .await
            .map_err(|e| failure("dbsize", "*", e))
    }

    async fn clear_all(&self) -> Result<usize, DomainError> {
        if self.namespace.is_scoped() {
            return self.delete_pattern("*").await;
        }

        // Unscoped: the logical database belongs to this cache
        let removed = self.size().await?;
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut self.conn())
            .await
            .map_err(|e| failure("flushdb", "*", e))?;

        tracing::warn!(removed, url = %self.config.url, "Flushed Redis database");
        Ok(removed)
    }
}
