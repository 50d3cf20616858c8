//! Cache outcome metrics
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.

use metrics::counter;

/// Which cache entry family a request touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Single,
    List,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Single => "single",
            CacheKind::List => "list",
        }
    }
}

/// Result of a cache read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    Error,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Error => "error",
        }
    }
}

/// Record one cache read
pub fn record_cache_request(model: &str, kind: CacheKind, outcome: CacheOutcome) {
    let labels = [
        ("model", model.to_string()),
        ("kind", kind.as_str().to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];

    counter!("data_factory_cache_requests_total", &labels).increment(1);
}

/// Record keys removed by an invalidation
pub fn record_cache_invalidation(model: &str, kind: CacheKind, removed: usize) {
    let labels = [
        ("model", model.to_string()),
        ("kind", kind.as_str().to_string()),
    ];

    counter!("data_factory_cache_invalidations_total", &labels).increment(removed as u64);
}
