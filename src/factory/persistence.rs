//! Binds a data factory to a `Storage` adapter

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::domain::codec::JsonCodec;
use crate::domain::error::ErrorCode;
use crate::domain::filter::Filter;
use crate::domain::model::Model;
use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::data_factory::{DataFactory, NoHooks, SourceOfTruth};
use super::engine::CacheAsideEngine;

/// Converts a model id into an entity key through `TryFrom`
pub fn convert_id<I, K>(id: &I) -> Result<K, DomainError>
where
    I: Clone + Display,
    K: TryFrom<I>,
    K::Error: Display,
{
    K::try_from(id.clone()).map_err(|e| {
        warn!(id = %id, error = %e, "Identifier conversion failed");
        DomainError::conversion(format!(
            "Cannot convert id '{}' to {}: {}",
            id,
            std::any::type_name::<K>(),
            e
        ))
    })
}

/// Converts a model id into an entity key through their JSON forms
///
/// Covers pairs without a `TryFrom` impl, such as a string id backed by a
/// numeric key.
pub fn convert_id_via_codec<I, K>(codec: &JsonCodec, id: &I) -> Result<K, DomainError>
where
    I: Serialize + Display,
    K: DeserializeOwned,
{
    codec.convert::<I, K>(id).map_err(|e| {
        warn!(id = %id, error = %e, "Identifier conversion failed");
        DomainError::conversion(format!(
            "Cannot convert id '{}' to {}",
            id,
            std::any::type_name::<K>()
        ))
    })
}

fn not_found<M: Model>(id: Option<&M::Id>, filter: Option<&Filter>) -> DomainError {
    match (id, filter) {
        (Some(id), _) => DomainError::not_found(format!("{} '{}' not found", M::model_type(), id)),
        (None, Some(filter)) => DomainError::not_found(format!(
            "{} matching {} not found",
            M::model_type(),
            filter.canonical_json()
        )),
        (None, None) => DomainError::not_found(format!("{} not found", M::model_type())),
    }
}

/// Model/entity mapping and post-operation hooks for one storage binding
#[async_trait]
pub trait EntityBinding<M: Model, E: StorageEntity>: Send + Sync {
    fn to_model(&self, entity: &E) -> Result<M, DomainError>;

    /// Builds the entity persisted by `create`
    fn to_new_entity(&self, model: &M) -> Result<E, DomainError>;

    /// Applies an update onto the currently stored entity
    fn apply_update(&self, model: &M, existing: E) -> Result<E, DomainError>;

    /// Maps a model id onto the entity key, see `convert_id`
    fn entity_id(&self, id: &M::Id) -> Result<E::Key, DomainError>;

    /// Locates the entity an id or filter refers to
    ///
    /// Filter-only lookups need an override.
    async fn find_entity(
        &self,
        storage: &dyn Storage<E>,
        id: Option<&M::Id>,
        _filter: Option<&Filter>,
    ) -> Result<Option<E>, DomainError> {
        match id {
            Some(id) => storage.find_by_id(&self.entity_id(id)?).await,
            None => Err(DomainError::factory_message(format!(
                "{} lookup by filter is not supported by this binding",
                M::model_type()
            ))),
        }
    }

    /// Entities backing `list`; ignores the filter unless overridden
    async fn list_entities(
        &self,
        storage: &dyn Storage<E>,
        _filter: Option<&Filter>,
    ) -> Result<Vec<E>, DomainError> {
        storage.find_all().await
    }

    async fn entity_exists(
        &self,
        storage: &dyn Storage<E>,
        id: Option<&M::Id>,
        _filter: Option<&Filter>,
    ) -> Result<bool, DomainError> {
        match id {
            Some(id) => storage.exists_by_id(&self.entity_id(id)?).await,
            None => Err(DomainError::factory_message(format!(
                "{} existence by filter is not supported by this binding",
                M::model_type()
            ))),
        }
    }

    async fn post_fetch(&self, _model: &M, _entity: &E) -> Result<(), DomainError> {
        Ok(())
    }

    /// Runs after `create`; leaves the cache alone by default
    async fn post_create(
        &self,
        _engine: &CacheAsideEngine<M>,
        _model: &M,
        _entity: &E,
    ) -> Result<(), DomainError> {
        Ok(())
    }

    /// Drops the stale entry then caches the fresh value; both steps propagate
    async fn post_update(
        &self,
        engine: &CacheAsideEngine<M>,
        model: &M,
        _entity: &E,
    ) -> Result<(), DomainError> {
        let id = model
            .id()
            .ok_or_else(|| DomainError::factory(ErrorCode::ID_IS_NULL))?;

        let refreshed = async {
            engine.invalidate_single(id).await?;
            engine.put_single_strict(id, model).await
        }
        .await;

        if let Err(e) = &refreshed {
            error!(model = M::model_type(), id = %id, error = %e, "Cache refresh after update failed");
        }

        refreshed
    }

    /// Drops the cache entry of the deleted record
    async fn post_delete(
        &self,
        engine: &CacheAsideEngine<M>,
        model: &M,
        _entity: &E,
    ) -> Result<(), DomainError> {
        if let Some(id) = model.id() {
            engine.invalidate_single(id).await?;
        }

        Ok(())
    }
}

/// `SourceOfTruth` backed by a `Storage` adapter and an `EntityBinding`
pub struct PersistenceSource<M, E, B> {
    storage: Arc<dyn Storage<E>>,
    binding: B,
    _model: PhantomData<fn() -> M>,
}

impl<M, E, B> std::fmt::Debug for PersistenceSource<M, E, B>
where
    E: StorageEntity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceSource")
            .field("storage", &self.storage)
            .field("model", &std::any::type_name::<M>())
            .finish()
    }
}

impl<M, E, B> PersistenceSource<M, E, B>
where
    M: Model,
    E: StorageEntity,
    B: EntityBinding<M, E>,
{
    pub fn new(storage: Arc<dyn Storage<E>>, binding: B) -> Self {
        Self {
            storage,
            binding,
            _model: PhantomData,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage<E>> {
        &self.storage
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    async fn require_entity(
        &self,
        id: Option<&M::Id>,
        filter: Option<&Filter>,
    ) -> Result<E, DomainError> {
        self.binding
            .find_entity(self.storage.as_ref(), id, filter)
            .await?
            .ok_or_else(|| not_found::<M>(id, filter))
    }
}

#[async_trait]
impl<M, E, B> SourceOfTruth<M> for PersistenceSource<M, E, B>
where
    M: Model,
    E: StorageEntity,
    B: EntityBinding<M, E>,
{
    async fn around_create(
        &self,
        engine: &CacheAsideEngine<M>,
        model: M,
    ) -> Result<M, DomainError> {
        let entity = self.binding.to_new_entity(&model)?;
        let saved = self.storage.save(entity).await?;
        let model = self.binding.to_model(&saved)?;

        self.binding.post_create(engine, &model, &saved).await?;
        Ok(model)
    }

    async fn around_fetch(
        &self,
        _engine: &CacheAsideEngine<M>,
        id: Option<&M::Id>,
        filter: Option<&Filter>,
    ) -> Result<M, DomainError> {
        let entity = self.require_entity(id, filter).await?;
        let model = self.binding.to_model(&entity)?;

        self.binding.post_fetch(&model, &entity).await?;
        Ok(model)
    }

    async fn around_list_fetch(
        &self,
        _engine: &CacheAsideEngine<M>,
        filter: Option<&Filter>,
    ) -> Result<Vec<M>, DomainError> {
        self.binding
            .list_entities(self.storage.as_ref(), filter)
            .await?
            .iter()
            .map(|entity| self.binding.to_model(entity))
            .collect()
    }

    async fn around_update(
        &self,
        engine: &CacheAsideEngine<M>,
        model: M,
        filter: Option<&Filter>,
    ) -> Result<M, DomainError> {
        let id = model
            .id()
            .ok_or_else(|| DomainError::factory(ErrorCode::ID_IS_NULL))?;

        let existing = self.require_entity(Some(id), filter).await?;
        let updated = self.binding.apply_update(&model, existing)?;
        let saved = self.storage.save(updated).await?;
        let fresh = self.binding.to_model(&saved)?;

        self.binding.post_update(engine, &fresh, &saved).await?;
        Ok(fresh)
    }

    async fn around_delete(
        &self,
        engine: &CacheAsideEngine<M>,
        id: Option<&M::Id>,
        filter: Option<&Filter>,
    ) -> Result<(), DomainError> {
        let entity = self.require_entity(id, filter).await?;
        let model = self.binding.to_model(&entity)?;

        self.storage.delete(&entity).await?;
        self.binding.post_delete(engine, &model, &entity).await
    }

    async fn count(&self) -> Result<u64, DomainError> {
        self.storage.count().await
    }

    async fn exists(&self, id: Option<&M::Id>, filter: Option<&Filter>) -> Result<bool, DomainError> {
        self.binding
            .entity_exists(self.storage.as_ref(), id, filter)
            .await
    }
}

/// A data factory whose source of truth is a `Storage` adapter
pub type PersistenceBoundFactory<M, E, B, H = NoHooks> =
    DataFactory<M, PersistenceSource<M, E, B>, H>;

impl<M, E, B> DataFactory<M, PersistenceSource<M, E, B>, NoHooks>
where
    M: Model,
    E: StorageEntity,
    B: EntityBinding<M, E>,
{
    /// Builds a factory over a storage adapter
    pub fn bind(engine: CacheAsideEngine<M>, storage: Arc<dyn Storage<E>>, binding: B) -> Self {
        DataFactory::new(engine, PersistenceSource::new(storage, binding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheStore;
    use crate::factory::policy::CachePolicy;
    use crate::factory::test_support::{order, OrderBinding, OrderEntity, Order};
    use crate::infrastructure::cache::InMemoryCache;
    use crate::infrastructure::storage::InMemoryStorage;

    #[test]
    fn test_convert_id() {
        let key: u32 = convert_id(&42_i64).unwrap();
        assert_eq!(key, 42);
    }

    #[test]
    fn test_convert_id_mismatch() {
        let err = convert_id::<i64, u32>(&-1).unwrap_err();

        assert!(matches!(err, DomainError::Conversion { .. }));
        assert_eq!(err.error_code(), Some(&ErrorCode::CONVERT_ID_FAIL));
    }

    #[test]
    fn test_convert_id_via_codec() {
        let codec = JsonCodec::strict();

        let key: u64 = convert_id_via_codec(&codec, &7_i32).unwrap();
        assert_eq!(key, 7);

        let err = convert_id_via_codec::<String, u64>(&codec, &"abc".to_string()).unwrap_err();
        assert_eq!(err.error_code(), Some(&ErrorCode::CONVERT_ID_FAIL));
    }

    #[tokio::test]
    async fn test_negative_id_fails_conversion_before_storage() {
        let storage: Arc<dyn Storage<OrderEntity>> = Arc::new(InMemoryStorage::new());
        let engine = CacheAsideEngine::<Order>::new(
            Arc::new(InMemoryCache::new()),
            Arc::new(JsonCodec::new()),
            CachePolicy::default(),
        );
        let factory = PersistenceBoundFactory::bind(engine, storage, OrderBinding::default());

        let err = factory.fetch(&-5).await.unwrap_err();
        assert!(matches!(err, DomainError::Conversion { .. }));
    }

    /// Binding relying on every default hook
    #[derive(Default)]
    struct PlainBinding;

    impl EntityBinding<Order, OrderEntity> for PlainBinding {
        fn to_model(&self, entity: &OrderEntity) -> Result<Order, DomainError> {
            OrderBinding::default().to_model(entity)
        }

        fn to_new_entity(&self, model: &Order) -> Result<OrderEntity, DomainError> {
            OrderBinding::default().to_new_entity(model)
        }

        fn apply_update(&self, model: &Order, existing: OrderEntity) -> Result<OrderEntity, DomainError> {
            OrderBinding::default().apply_update(model, existing)
        }

        fn entity_id(&self, id: &i64) -> Result<u32, DomainError> {
            convert_id(id)
        }
    }

    fn plain_factory(
        seed: Vec<Order>,
    ) -> PersistenceBoundFactory<Order, OrderEntity, PlainBinding> {
        let entities = seed
            .iter()
            .map(|m| PlainBinding.to_new_entity(m).unwrap())
            .collect();
        let storage: Arc<dyn Storage<OrderEntity>> = Arc::new(InMemoryStorage::with_entities(entities));
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCache::new());
        let engine = CacheAsideEngine::new(store, Arc::new(JsonCodec::new()), CachePolicy::default());

        PersistenceBoundFactory::bind(engine, storage, PlainBinding)
    }

    #[tokio::test]
    async fn test_default_list_ignores_filter() {
        let factory = plain_factory(vec![order(1, "OPEN"), order(2, "CLOSED")]);

        let listed = factory
            .list(Filter::new().with("status", "OPEN"))
            .await
            .unwrap();

        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_default_filter_lookup_is_a_factory_error() {
        let factory = plain_factory(vec![order(1, "OPEN")]);

        let err = factory
            .fetch_matching(Filter::new().with("status", "OPEN"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Factory { code: None, .. }));

        let err = factory
            .exists_matching(&Filter::new().with("status", "OPEN"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Factory { .. }));

        let err = factory
            .delete_matching(Filter::new().with("status", "OPEN"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Factory { .. }));
    }

    #[tokio::test]
    async fn test_fetch_with_filter_uses_id() {
        let factory = plain_factory(vec![order(1, "OPEN")]);

        let fetched = factory
            .fetch_with(&1, Filter::new().with("status", "IGNORED"))
            .await
            .unwrap();
        assert_eq!(fetched.status, "OPEN");
    }

    #[tokio::test]
    async fn test_update_with_refreshes_cache() {
        let factory = plain_factory(vec![order(2, "OPEN")]);

        let updated = factory
            .update_with(order(2, "PAID"), Filter::new().with("region", "eu"))
            .await
            .unwrap();
        assert_eq!(updated.status, "PAID");

        assert_eq!(factory.engine().get_single(&2).await, Some(updated));
    }

    #[test]
    fn test_not_found_messages() {
        let by_id = not_found::<Order>(Some(&3), None);
        assert!(by_id.to_string().contains("Order '3' not found"));

        let filter = Filter::new().with("status", "OPEN");
        let by_filter = not_found::<Order>(None, Some(&filter));
        assert!(by_filter.to_string().contains(r#"{"status":"OPEN"}"#));
    }
}
