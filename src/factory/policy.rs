//! Per-model cache policy

use std::time::Duration;

/// Default TTL for both single-entity and list entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Cache enable flags and TTLs for one model type
///
/// Read-only once handed to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub single_enabled: bool,
    pub list_enabled: bool,
    pub single_ttl: Duration,
    pub list_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            single_enabled: true,
            list_enabled: true,
            single_ttl: DEFAULT_TTL,
            list_ttl: DEFAULT_TTL,
        }
    }
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy with both caches switched off
    pub fn disabled() -> Self {
        Self::default()
            .with_single_enabled(false)
            .with_list_enabled(false)
    }

    pub fn with_single_enabled(mut self, enabled: bool) -> Self {
        self.single_enabled = enabled;
        self
    }

    pub fn with_list_enabled(mut self, enabled: bool) -> Self {
        self.list_enabled = enabled;
        self
    }

    pub fn with_single_ttl(mut self, ttl: Duration) -> Self {
        self.single_ttl = ttl;
        self
    }

    pub fn with_list_ttl(mut self, ttl: Duration) -> Self {
        self.list_ttl = ttl;
        self
    }
}
