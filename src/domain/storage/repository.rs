//! Persistence adapter contract

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::filter::Filter;
use crate::domain::DomainError;

use super::entity::StorageEntity;

/// Source-of-truth store for one entity type
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity,
{
    /// Retrieves an entity by its key
    async fn find_by_id(&self, id: &E::Key) -> Result<Option<E>, DomainError>;

    /// Retrieves all entities
    async fn find_all(&self) -> Result<Vec<E>, DomainError>;

    /// Retrieves the entities whose serialized fields match the filter
    async fn find_matching(&self, filter: &Filter) -> Result<Vec<E>, DomainError> {
        let mut matching = Vec::new();

        for entity in self.find_all().await? {
            let record = serde_json::to_value(&entity)?;

            if filter.matches(&record) {
                matching.push(entity);
            }
        }

        Ok(matching)
    }

    /// Inserts or replaces an entity, returning the stored version
    async fn save(&self, entity: E) -> Result<E, DomainError>;

    /// Deletes an entity, returns true if it was present
    async fn delete(&self, entity: &E) -> Result<bool, DomainError>;

    /// Checks if an entity exists by its key
    async fn exists_by_id(&self, id: &E::Key) -> Result<bool, DomainError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    /// Returns the count of entities
    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.find_all().await?.len() as u64)
    }
}
