//! In-memory storage implementation

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Thread-safe in-memory storage implementation
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryStorage<E>
where
    E: StorageEntity,
{
    entities: RwLock<HashMap<String, E>>,
}

impl<E> Default for InMemoryStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStorage<E>
where
    E: StorageEntity,
{
    /// Creates a new empty in-memory storage
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Creates storage pre-populated with entities
    pub fn with_entities(entities: Vec<E>) -> Self {
        let map = entities
            .into_iter()
            .map(|entity| (entity.key().storage_key(), entity))
            .collect();

        Self {
            entities: RwLock::new(map),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, E>>, DomainError> {
        self.entities
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, E>>, DomainError> {
        self.entities
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl<E> Storage<E> for InMemoryStorage<E>
where
    E: StorageEntity,
{
    async fn find_by_id(&self, id: &E::Key) -> Result<Option<E>, DomainError> {
        Ok(self.read()?.get(&id.storage_key()).cloned())
    }

    async fn find_all(&self) -> Result<Vec<E>, DomainError> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().storage_key();
        self.write()?.insert(key, entity.clone());
        Ok(entity)
    }

    async fn delete(&self, entity: &E) -> Result<bool, DomainError> {
        Ok(self.write()?.remove(&entity.key().storage_key()).is_some())
    }

    async fn exists_by_id(&self, id: &E::Key) -> Result<bool, DomainError> {
        Ok(self.read()?.contains_key(&id.storage_key()))
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.read()?.len() as u64)
    }
}
