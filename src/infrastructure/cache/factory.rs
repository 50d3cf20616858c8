//! Runtime selection of the cache backend

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::domain::cache::CacheStore;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};

/// Cache backend kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheType {
    #[default]
    InMemory,
    Redis,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CacheType::InMemory => "in_memory",
            CacheType::Redis => "redis",
        };
        f.write_str(name)
    }
}

impl FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            other => Err(DomainError::configuration(format!(
                "Unknown cache backend '{}' (expected in_memory or redis)",
                other
            ))),
        }
    }
}

/// Backend selection together with the backend's own settings
#[derive(Debug, Clone)]
pub enum CacheConfig {
    InMemory(InMemoryCacheConfig),
    Redis(RedisCacheConfig),
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::InMemory(InMemoryCacheConfig::default())
    }
}

impl CacheConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self::Redis(RedisCacheConfig::new(url))
    }

    pub fn cache_type(&self) -> CacheType {
        match self {
            Self::InMemory(_) => CacheType::InMemory,
            Self::Redis(_) => CacheType::Redis,
        }
    }
}

/// Builds `CacheStore` trait objects from configuration
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    /// Opens the configured backend; Redis is connected eagerly
    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn CacheStore>, DomainError> {
        let store: Arc<dyn CacheStore> = match config {
            CacheConfig::InMemory(settings) => {
                Arc::new(InMemoryCache::with_config(settings.clone()))
            }
            CacheConfig::Redis(settings) => Arc::new(RedisCache::new(settings.clone()).await?),
        };

        info!(backend = %config.cache_type(), "Cache backend ready");
        Ok(store)
    }
}
