//! Storage entity traits

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{de::DeserializeOwned, Serialize};

/// Trait for types that can be used as storage keys
pub trait StorageKey: Clone + Debug + Display + Eq + Hash + Send + Sync + 'static {
    /// Returns the key as a string for storage backends that require string keys
    fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl<T> StorageKey for T where T: Clone + Debug + Display + Eq + Hash + Send + Sync + 'static {}

/// Trait for persisted records
pub trait StorageEntity:
    Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The key type for this entity
    type Key: StorageKey;

    /// Returns the entity's key
    fn key(&self) -> &Self::Key;
}
