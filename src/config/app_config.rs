use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;
use crate::factory::CachePolicy;
use crate::infrastructure::cache::{
    CacheConfig, CacheType, InMemoryCacheConfig, RedisCacheConfig,
};
use crate::infrastructure::storage::{PostgresConfig, StorageConfig, StorageType};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub cache: CacheSettings,
    pub storage: StorageSettings,
    /// Policy applied to every model type without an override
    pub policy: PolicySettings,
    /// Per-model-type overrides, keyed by lower-case model type
    pub models: HashMap<String, PolicyOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `in_memory` or `redis`
    pub backend: String,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    pub max_capacity: u64,
    pub time_to_idle_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `in_memory` or `postgres`
    pub backend: String,
    pub postgres_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicySettings {
    pub single_enabled: bool,
    pub list_enabled: bool,
    pub single_ttl_secs: u64,
    pub list_ttl_secs: u64,
}

/// Partial policy; unset fields fall back to `AppConfig::policy`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyOverride {
    pub single_enabled: Option<bool>,
    pub list_enabled: Option<bool>,
    pub single_ttl_secs: Option<u64>,
    pub list_ttl_secs: Option<u64>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheType::InMemory.to_string(),
            redis_url: None,
            key_prefix: None,
            max_capacity: 10_000,
            time_to_idle_secs: None,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageType::InMemory.to_string(),
            postgres_url: None,
            max_connections: 10,
        }
    }
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            single_enabled: true,
            list_enabled: true,
            single_ttl_secs: 60,
            list_ttl_secs: 60,
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> Result<CacheConfig, DomainError> {
        match self.backend.parse::<CacheType>()? {
            CacheType::InMemory => {
                let mut settings = InMemoryCacheConfig::default().with_max_capacity(self.max_capacity);

                if let Some(secs) = self.time_to_idle_secs {
                    settings = settings.with_time_to_idle(Duration::from_secs(secs));
                }

                Ok(CacheConfig::InMemory(settings))
            }
            CacheType::Redis => {
                let url = self.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("cache.redis_url is required for the redis backend")
                })?;

                let mut settings = RedisCacheConfig::new(url);
                if let Some(prefix) = &self.key_prefix {
                    settings = settings.with_key_prefix(prefix.clone())?;
                }

                Ok(CacheConfig::Redis(settings))
            }
        }
    }
}

impl StorageSettings {
    pub fn to_storage_config(&self) -> Result<StorageConfig, DomainError> {
        match self.backend.parse::<StorageType>()? {
            StorageType::InMemory => Ok(StorageConfig::in_memory()),
            StorageType::Postgres => {
                let url = self.postgres_url.clone().ok_or_else(|| {
                    DomainError::configuration(
                        "storage.postgres_url is required for the postgres backend",
                    )
                })?;

                Ok(StorageConfig::Postgres(
                    PostgresConfig::new(url).with_max_connections(self.max_connections),
                ))
            }
        }
    }
}

impl PolicySettings {
    pub fn to_policy(&self) -> CachePolicy {
        CachePolicy::new()
            .with_single_enabled(self.single_enabled)
            .with_list_enabled(self.list_enabled)
            .with_single_ttl(Duration::from_secs(self.single_ttl_secs))
            .with_list_ttl(Duration::from_secs(self.list_ttl_secs))
    }

    fn merged(&self, overrides: &PolicyOverride) -> Self {
        Self {
            single_enabled: overrides.single_enabled.unwrap_or(self.single_enabled),
            list_enabled: overrides.list_enabled.unwrap_or(self.list_enabled),
            single_ttl_secs: overrides.single_ttl_secs.unwrap_or(self.single_ttl_secs),
            list_ttl_secs: overrides.list_ttl_secs.unwrap_or(self.list_ttl_secs),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Effective cache policy of a model type
    pub fn policy_for(&self, model_type: &str) -> CachePolicy {
        match self.models.get(&model_type.to_lowercase()) {
            Some(overrides) => self.policy.merged(overrides).to_policy(),
            None => self.policy.to_policy(),
        }
    }
}
