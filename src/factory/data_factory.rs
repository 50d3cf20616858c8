//! Generic CRUD orchestration over a cache-aside engine and a source of truth

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::error::ErrorCode;
use crate::domain::filter::Filter;
use crate::domain::model::Model;
use crate::domain::DomainError;

use super::engine::{CacheAsideEngine, CacheLookup};

/// Extension points run before the source of truth is consulted
///
/// Every hook defaults to identity. A hook may rewrite the filter or reject
/// the call with an error.
pub trait FactoryHooks<M: Model>: Send + Sync {
    fn pre_create(&self, model: M) -> Result<M, DomainError> {
        Ok(model)
    }

    fn pre_fetch(
        &self,
        _id: Option<&M::Id>,
        filter: Option<Filter>,
    ) -> Result<Option<Filter>, DomainError> {
        Ok(filter)
    }

    fn pre_delete(
        &self,
        _id: Option<&M::Id>,
        filter: Option<Filter>,
    ) -> Result<Option<Filter>, DomainError> {
        Ok(filter)
    }

    fn pre_update(
        &self,
        _model: &M,
        filter: Option<Filter>,
    ) -> Result<Option<Filter>, DomainError> {
        Ok(filter)
    }
}

/// Hooks that change nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<M: Model> FactoryHooks<M> for NoHooks {}

/// The system of record behind a factory
///
/// `around_update` must leave the cache holding the fresh value for the
/// model's id, and `around_delete` must invalidate the deleted id, before they
/// return.
#[async_trait]
pub trait SourceOfTruth<M: Model>: Send + Sync {
    async fn around_create(&self, engine: &CacheAsideEngine<M>, model: M)
        -> Result<M, DomainError>;

    /// Fails with `NotFound` when nothing matches
    async fn around_fetch(
        &self,
        engine: &CacheAsideEngine<M>,
        id: Option<&M::Id>,
        filter: Option<&Filter>,
    ) -> Result<M, DomainError>;

    async fn around_list_fetch(
        &self,
        engine: &CacheAsideEngine<M>,
        filter: Option<&Filter>,
    ) -> Result<Vec<M>, DomainError>;

    /// Fails with `NotFound` when the record to update is absent
    async fn around_update(
        &self,
        engine: &CacheAsideEngine<M>,
        model: M,
        filter: Option<&Filter>,
    ) -> Result<M, DomainError>;

    /// Fails with `NotFound` when the record to delete is absent
    async fn around_delete(
        &self,
        engine: &CacheAsideEngine<M>,
        id: Option<&M::Id>,
        filter: Option<&Filter>,
    ) -> Result<(), DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;

    async fn exists(&self, id: Option<&M::Id>, filter: Option<&Filter>)
        -> Result<bool, DomainError>;
}

/// Cache-aside data access for model type `M`
///
/// Reads try the cache first and fall back to the source of truth; writes go
/// to the source of truth, which keeps the cache in step.
#[derive(Debug)]
pub struct DataFactory<M: Model, S, H = NoHooks> {
    engine: CacheAsideEngine<M>,
    source: S,
    hooks: H,
}

impl<M, S> DataFactory<M, S, NoHooks>
where
    M: Model,
    S: SourceOfTruth<M>,
{
    pub fn new(engine: CacheAsideEngine<M>, source: S) -> Self {
        Self {
            engine,
            source,
            hooks: NoHooks,
        }
    }
}

impl<M, S, H> DataFactory<M, S, H>
where
    M: Model,
    S: SourceOfTruth<M>,
    H: FactoryHooks<M>,
{
    /// Replaces the pre-operation hooks
    pub fn with_hooks<H2: FactoryHooks<M>>(self, hooks: H2) -> DataFactory<M, S, H2> {
        DataFactory {
            engine: self.engine,
            source: self.source,
            hooks,
        }
    }

    /// The cache engine, for explicit purges
    pub fn engine(&self) -> &CacheAsideEngine<M> {
        &self.engine
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn count(&self) -> Result<u64, DomainError> {
        self.source.count().await
    }

    pub async fn exists(&self, id: &M::Id) -> Result<bool, DomainError> {
        self.source.exists(Some(id), None).await
    }

    pub async fn exists_matching(&self, filter: &Filter) -> Result<bool, DomainError> {
        self.source.exists(None, Some(filter)).await
    }

    /// Persists a new record
    ///
    /// The cache is left untouched: the new record is neither cached nor are
    /// list entries invalidated.
    pub async fn create(&self, model: M) -> Result<M, DomainError> {
        let model = self.hooks.pre_create(model)?;
        self.source.around_create(&self.engine, model).await
    }

    pub async fn delete(&self, id: &M::Id) -> Result<(), DomainError> {
        let filter = self.hooks.pre_delete(Some(id), None)?;
        self.source
            .around_delete(&self.engine, Some(id), filter.as_ref())
            .await
    }

    pub async fn delete_matching(&self, filter: Filter) -> Result<(), DomainError> {
        let filter = self.hooks.pre_delete(None, Some(filter))?;
        self.source
            .around_delete(&self.engine, None, filter.as_ref())
            .await
    }

    /// Fetches by id, served from cache when possible
    pub async fn fetch(&self, id: &M::Id) -> Result<M, DomainError> {
        self.fetch_inner(Some(id), None).await
    }

    pub async fn fetch_with(&self, id: &M::Id, filter: Filter) -> Result<M, DomainError> {
        self.fetch_inner(Some(id), Some(filter)).await
    }

    /// Fetches the record matching a filter; never cached
    pub async fn fetch_matching(&self, filter: Filter) -> Result<M, DomainError> {
        self.fetch_inner(None, Some(filter)).await
    }

    async fn fetch_inner(
        &self,
        id: Option<&M::Id>,
        filter: Option<Filter>,
    ) -> Result<M, DomainError> {
        if let Some(id) = id {
            if let Some(model) = self.engine.get_single(id).await {
                debug!(model = M::model_type(), id = %id, "Served from cache");
                return Ok(model);
            }
        }

        let filter = self.hooks.pre_fetch(id, filter)?;
        let model = self
            .source
            .around_fetch(&self.engine, id, filter.as_ref())
            .await?;

        // An update that landed while this load was in flight keeps its entry
        if let Some(id) = id {
            self.engine.put_single_if_absent(id, &model).await;
        }

        Ok(model)
    }

    /// Updates an existing record
    ///
    /// When this returns `Ok`, the cache holds the updated value for the id.
    pub async fn update(&self, model: M) -> Result<M, DomainError> {
        self.update_inner(model, None).await
    }

    pub async fn update_with(&self, model: M, filter: Filter) -> Result<M, DomainError> {
        self.update_inner(model, Some(filter)).await
    }

    async fn update_inner(&self, model: M, filter: Option<Filter>) -> Result<M, DomainError> {
        if model.id().is_none() {
            return Err(DomainError::factory(ErrorCode::ID_IS_NULL));
        }

        let filter = self.hooks.pre_update(&model, filter)?;
        self.source
            .around_update(&self.engine, model, filter.as_ref())
            .await
    }

    /// Lists records matching a filter
    ///
    /// A cached list, empty or not, is returned as is. On a miss the source
    /// result is cached, including an empty one.
    pub async fn list(&self, filter: Filter) -> Result<Vec<M>, DomainError> {
        self.list_inner(Some(&filter)).await
    }

    pub async fn list_all(&self) -> Result<Vec<M>, DomainError> {
        self.list_inner(None).await
    }

    async fn list_inner(&self, filter: Option<&Filter>) -> Result<Vec<M>, DomainError> {
        match self.engine.lookup_list(filter).await {
            CacheLookup::Hit(models) => return Ok(models),
            CacheLookup::Miss => {}
            CacheLookup::StoreError(e) => {
                warn!(model = M::model_type(), error = %e, "List cache read failed, treating as miss");
            }
        }

        let models = self.source.around_list_fetch(&self.engine, filter).await?;
        self.engine.put_list(filter, &models).await;

        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::domain::cache::{CacheStore, MockCacheStore};
    use crate::domain::storage::Storage;
    use crate::factory::policy::CachePolicy;
    use crate::factory::test_support::{
        gated_order_factory, order, order_factory, order_factory_with, Order,
    };
    use crate::infrastructure::cache::InMemoryCache;

    #[tokio::test]
    async fn test_fetch_twice_hits_persistence_once() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, storage) = order_factory(cache.clone(), vec![order(42, "OPEN")]);

        let first = factory.fetch(&42).await.unwrap();
        assert_eq!(storage.find_by_id_calls(), 1);
        assert!(cache.exists("order:42").await.unwrap());

        let remaining = cache.ttl("order:42").await.unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(60));

        let second = factory.fetch(&42).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(storage.find_by_id_calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_single_cache_always_reads_persistence() {
        // Any store call panics on a mock without expectations
        let store: Arc<dyn CacheStore> = Arc::new(MockCacheStore::new());
        let (factory, storage) = order_factory_with(
            store,
            CachePolicy::default().with_single_enabled(false),
            vec![order(42, "OPEN")],
        );

        factory.fetch(&42).await.unwrap();
        factory.fetch(&42).await.unwrap();

        assert_eq!(storage.find_by_id_calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found_and_not_cached() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, _) = order_factory(cache.clone(), vec![]);

        let err = factory.fetch(&404).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.http_status(), 400);
        assert!(!cache.exists("order:404").await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_fails_open_on_cache_error() {
        let mut store = MockCacheStore::new();
        store
            .expect_get_raw()
            .returning(|_| Err(DomainError::cache("connection reset")));
        store
            .expect_set_raw_if_absent()
            .returning(|_, _, _| Err(DomainError::cache("connection reset")));

        let (factory, storage) =
            order_factory_with(Arc::new(store), CachePolicy::default(), vec![order(1, "OPEN")]);

        let fetched = factory.fetch(&1).await.unwrap();

        assert_eq!(fetched.status, "OPEN");
        assert_eq!(storage.find_by_id_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_then_fetch_returns_fresh_value() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, storage) = order_factory(cache, vec![order(42, "OPEN")]);

        factory.fetch(&42).await.unwrap();

        let updated = factory.update(order(42, "SHIPPED")).await.unwrap();
        assert_eq!(updated.status, "SHIPPED");

        let calls_after_update = storage.find_by_id_calls();
        let fetched = factory.fetch(&42).await.unwrap();

        assert_eq!(fetched.status, "SHIPPED");
        assert_eq!(storage.find_by_id_calls(), calls_after_update);
    }

    #[tokio::test]
    async fn test_update_during_inflight_fetch_keeps_fresh_value() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, storage) = gated_order_factory(cache, vec![order(42, "OPEN")]);

        // The fetch reads OPEN, then stalls until the update has finished
        let (stale, updated) = tokio::join!(factory.fetch(&42), async {
            storage.reached().notified().await;
            let updated = factory.update(order(42, "SHIPPED")).await;
            storage.release().notify_one();
            updated
        });

        assert_eq!(stale.unwrap().status, "OPEN");
        assert_eq!(updated.unwrap().status, "SHIPPED");

        let fetched = factory.fetch(&42).await.unwrap();
        assert_eq!(fetched.status, "SHIPPED");
    }

    #[tokio::test]
    async fn test_update_without_id_is_rejected() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, storage) = order_factory(cache, vec![]);

        let err = factory.update(Order::draft("OPEN")).await.unwrap_err();

        assert_eq!(err.error_code(), Some(&ErrorCode::ID_IS_NULL));
        assert_eq!(storage.find_by_id_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, _) = order_factory(cache, vec![]);

        let err = factory.update(order(9, "PAID")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_propagates_invalidation_failure() {
        let mut store = MockCacheStore::new();
        store
            .expect_delete()
            .returning(|_| Err(DomainError::cache("cluster down")));

        let (factory, storage) =
            order_factory_with(Arc::new(store), CachePolicy::default(), vec![order(3, "OPEN")]);

        let err = factory.update(order(3, "PAID")).await.unwrap_err();
        assert!(err.is_cache());

        // The write itself went through
        let saved = storage.inner().find_by_id(&3).await.unwrap().unwrap();
        assert_eq!(saved.status, "PAID");
    }

    #[tokio::test]
    async fn test_update_propagates_repopulate_failure() {
        let mut store = MockCacheStore::new();
        store.expect_delete().returning(|_| Ok(true));
        store
            .expect_set_raw()
            .returning(|_, _, _| Err(DomainError::cache("out of memory")));

        let (factory, _) =
            order_factory_with(Arc::new(store), CachePolicy::default(), vec![order(3, "OPEN")]);

        let err = factory.update(order(3, "PAID")).await.unwrap_err();
        assert!(err.is_cache());
    }

    #[tokio::test]
    async fn test_create_does_not_touch_cache() {
        // Any store call panics on a mock without expectations
        let store: Arc<dyn CacheStore> = Arc::new(MockCacheStore::new());
        let (factory, storage) = order_factory_with(store, CachePolicy::default(), vec![]);

        let created = factory.create(order(5, "NEW")).await.unwrap();

        assert_eq!(created.id, Some(5));
        assert_eq!(storage.inner().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_invalidates_single_entry() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, storage) = order_factory(cache.clone(), vec![order(8, "OPEN")]);

        factory.fetch(&8).await.unwrap();
        assert!(cache.exists("order:8").await.unwrap());

        factory.delete(&8).await.unwrap();

        assert!(!cache.exists("order:8").await.unwrap());
        assert!(!storage.inner().exists_by_id(&8).await.unwrap());
        assert!(factory.fetch(&8).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, _) = order_factory(cache, vec![]);

        assert!(factory.delete(&1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_cached_empty_list_skips_persistence() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, storage) = order_factory(cache, vec![order(1, "CLOSED")]);
        let open = Filter::new().with("status", "OPEN");

        let first = factory.list(open.clone()).await.unwrap();
        assert!(first.is_empty());
        assert_eq!(storage.list_calls(), 1);

        let second = factory.list(open).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(storage.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_are_cached_separately() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, storage) = order_factory(
            cache,
            vec![order(1, "OPEN"), order(2, "OPEN"), order(3, "CLOSED")],
        );

        assert_eq!(factory.list(Filter::new().with("status", "OPEN")).await.unwrap().len(), 2);
        assert_eq!(factory.list(Filter::new().with("status", "CLOSED")).await.unwrap().len(), 1);
        assert_eq!(factory.list_all().await.unwrap().len(), 3);
        assert_eq!(storage.list_calls(), 3);

        assert_eq!(factory.list(Filter::new().with("status", "OPEN")).await.unwrap().len(), 2);
        assert_eq!(storage.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_list_purge_forces_reload() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, storage) = order_factory(cache, vec![order(1, "OPEN")]);

        factory.list_all().await.unwrap();
        factory.create(order(2, "OPEN")).await.unwrap();

        // Stale until purged
        assert_eq!(factory.list_all().await.unwrap().len(), 1);

        assert_eq!(factory.engine().invalidate_all_lists().await.unwrap(), 1);
        assert_eq!(factory.list_all().await.unwrap().len(), 2);
        assert_eq!(storage.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_count_and_exists() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, _) = order_factory(cache, vec![order(1, "OPEN"), order(2, "PAID")]);

        assert_eq!(factory.count().await.unwrap(), 2);
        assert!(factory.exists(&1).await.unwrap());
        assert!(!factory.exists(&3).await.unwrap());
        assert!(factory
            .exists_matching(&Filter::new().with("status", "PAID"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_fetch_matching_is_never_cached() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, _) = order_factory(cache.clone(), vec![order(4, "PAID")]);

        let found = factory
            .fetch_matching(Filter::new().with("status", "PAID"))
            .await
            .unwrap();

        assert_eq!(found.id, Some(4));
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    struct RequireRegion;

    impl FactoryHooks<Order> for RequireRegion {
        fn pre_fetch(
            &self,
            _id: Option<&i64>,
            filter: Option<Filter>,
        ) -> Result<Option<Filter>, DomainError> {
            Ok(Some(filter.unwrap_or_default().with("region", "eu")))
        }

        fn pre_create(&self, model: Order) -> Result<Order, DomainError> {
            if model.status.is_empty() {
                return Err(DomainError::validation("status is required"));
            }
            Ok(model)
        }
    }

    #[tokio::test]
    async fn test_hooks_rewrite_filter_and_validate() {
        let cache = Arc::new(InMemoryCache::new());
        let (factory, _) = order_factory(cache, vec![order(1, "OPEN"), order(2, "OPEN").in_region("us")]);
        let factory = factory.with_hooks(RequireRegion);

        // Region "eu" is injected, so only order 1 is a match
        let found = factory
            .fetch_matching(Filter::new().with("status", "OPEN"))
            .await
            .unwrap();
        assert_eq!(found.id, Some(1));

        let err = factory.create(order(3, "")).await.unwrap_err();
        assert_eq!(err.http_status(), 400);
    }
}
