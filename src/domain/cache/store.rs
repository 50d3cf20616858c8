//! Key-value cache store contract

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Key-value cache backend with per-entry TTL
///
/// Values are opaque JSON strings; expiry is owned by the backend. Keys are
/// lower-case ASCII with colon-delimited segments. Pattern operations take
/// glob patterns (`*` matches any run, `?` one character).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Gets a raw value, `None` when absent or expired
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Stores a raw value that expires after `ttl`
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Stores a raw value only when no live entry exists, atomically
    ///
    /// Returns whether the value was written. A present entry keeps its value
    /// and TTL.
    async fn set_raw_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, DomainError>;

    /// Deletes a key, returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Enumerates live keys matching a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DomainError>;

    /// Deletes every key matching a glob pattern, returns the number removed
    ///
    /// Keys are enumerated first and deleted afterwards; a key written between
    /// the two steps may survive.
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        let keys = self.keys(pattern).await?;
        let mut removed = 0;

        for key in keys {
            if self.delete(&key).await? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Checks whether a live entry exists for the key
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Remaining time-to-live of an entry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError>;

    /// Approximate number of live entries
    async fn size(&self) -> Result<usize, DomainError>;

    /// Removes every entry, returns the number removed
    async fn clear_all(&self) -> Result<usize, DomainError> {
        self.delete_pattern("*").await
    }
}

/// Compiles a glob pattern into an anchored regex
pub fn glob_to_regex(pattern: &str) -> Result<Regex, DomainError> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');

    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }

    expr.push('$');

    Regex::new(&expr)
        .map_err(|e| DomainError::cache_with_code("INVALID_PATTERN", format!("{}: {}", pattern, e)))
}
