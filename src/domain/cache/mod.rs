//! Cache domain - key derivation and the key-value store contract

mod key;
mod store;

pub use key::{KeyCodec, LIST_PREFIX, SEPARATOR};
pub use store::{glob_to_regex, CacheStore};

#[cfg(test)]
pub use store::MockCacheStore;
