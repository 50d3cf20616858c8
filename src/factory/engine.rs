//! Cache-aside orchestration for one model type

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::cache::{CacheStore, KeyCodec};
use crate::domain::codec::JsonCodec;
use crate::domain::filter::Filter;
use crate::domain::model::Model;
use crate::domain::DomainError;
use crate::infrastructure::metrics::{
    record_cache_invalidation, record_cache_request, CacheKind, CacheOutcome,
};

use super::policy::CachePolicy;

/// Outcome of a cache read
///
/// Keeps a genuine miss apart from a backend failure so each call site can
/// pick fail-open or fail-closed handling.
#[derive(Debug)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    StoreError(DomainError),
}

impl<T> CacheLookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }

    /// Hit value, treating a store failure as a miss
    pub fn hit(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss | CacheLookup::StoreError(_) => None,
        }
    }

    /// Hit value, propagating a store failure
    pub fn into_result(self) -> Result<Option<T>, DomainError> {
        match self {
            CacheLookup::Hit(value) => Ok(Some(value)),
            CacheLookup::Miss => Ok(None),
            CacheLookup::StoreError(e) => Err(e),
        }
    }
}

/// Single-entity and list caching for model type `M`
///
/// Reads and ordinary writes fail open: a broken cache degrades to "always
/// miss". Invalidations and `put_single_strict` propagate store errors.
#[derive(Debug)]
pub struct CacheAsideEngine<M: Model> {
    store: Arc<dyn CacheStore>,
    codec: Arc<JsonCodec>,
    policy: CachePolicy,
    keys: KeyCodec,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for CacheAsideEngine<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            codec: Arc::clone(&self.codec),
            policy: self.policy.clone(),
            keys: self.keys.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> CacheAsideEngine<M> {
    pub fn new(store: Arc<dyn CacheStore>, codec: Arc<JsonCodec>, policy: CachePolicy) -> Self {
        Self {
            store,
            codec,
            policy,
            keys: KeyCodec::for_model(M::model_type()),
            _model: PhantomData,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn keys(&self) -> &KeyCodec {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    fn model(&self) -> &str {
        self.keys.model_type()
    }

    async fn read<T>(&self, key: &str, kind: CacheKind) -> CacheLookup<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let lookup = match self.store.get_raw(key).await {
            Ok(Some(raw)) => match self.codec.decode::<T>(&raw) {
                Ok(value) => CacheLookup::Hit(value),
                Err(e) => CacheLookup::StoreError(e),
            },
            Ok(None) => CacheLookup::Miss,
            Err(e) => CacheLookup::StoreError(e),
        };

        let outcome = match &lookup {
            CacheLookup::Hit(_) => CacheOutcome::Hit,
            CacheLookup::Miss => CacheOutcome::Miss,
            CacheLookup::StoreError(_) => CacheOutcome::Error,
        };

        debug!(model = self.model(), key, outcome = outcome.as_str(), "Cache lookup");
        record_cache_request(self.model(), kind, outcome);

        lookup
    }

    async fn write<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), DomainError>
    where
        T: serde::Serialize + ?Sized,
    {
        let raw = self.codec.encode(value)?;
        self.store.set_raw(key, &raw, ttl).await?;

        debug!(model = self.model(), key, ttl_ms = ttl.as_millis() as u64, "Cache write");
        Ok(())
    }

    /// Reads a single entity, `Miss` without touching the store when disabled
    pub async fn lookup_single(&self, id: &M::Id) -> CacheLookup<M> {
        if !self.policy.single_enabled {
            return CacheLookup::Miss;
        }

        self.read(&self.keys.single(id), CacheKind::Single).await
    }

    /// Fail-open single read
    pub async fn get_single(&self, id: &M::Id) -> Option<M> {
        match self.lookup_single(id).await {
            CacheLookup::StoreError(e) => {
                warn!(model = self.model(), id = %id, error = %e, "Cache read failed, treating as miss");
                None
            }
            lookup => lookup.hit(),
        }
    }

    /// Caches a single entity with the policy TTL, absorbing failures
    pub async fn put_single(&self, id: &M::Id, model: &M) {
        self.put_single_with_ttl(id, model, self.policy.single_ttl)
            .await;
    }

    /// Caches a single entity with an explicit TTL, absorbing failures
    pub async fn put_single_with_ttl(&self, id: &M::Id, model: &M, ttl: Duration) {
        if !self.policy.single_enabled {
            return;
        }

        if let Err(e) = self.write(&self.keys.single(id), model, ttl).await {
            warn!(model = self.model(), id = %id, error = %e, "Cache write failed");
        }
    }

    /// Caches a freshly loaded entity unless an entry already exists
    ///
    /// Read paths use this so a load that raced a write cannot replace the
    /// entry the write installed. Failures are absorbed.
    pub async fn put_single_if_absent(&self, id: &M::Id, model: &M) {
        if !self.policy.single_enabled {
            return;
        }

        let key = self.keys.single(id);
        let ttl = self.policy.single_ttl;
        let written = match self.codec.encode(model) {
            Ok(raw) => self.store.set_raw_if_absent(&key, &raw, ttl).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(true) => debug!(model = self.model(), key, ttl_ms = ttl.as_millis() as u64, "Cache write"),
            Ok(false) => debug!(model = self.model(), key, "Cache entry already present, write skipped"),
            Err(e) => warn!(model = self.model(), id = %id, error = %e, "Cache write failed"),
        }
    }

    /// Caches a single entity with the policy TTL, propagating failures
    pub async fn put_single_strict(&self, id: &M::Id, model: &M) -> Result<(), DomainError> {
        if !self.policy.single_enabled {
            return Ok(());
        }

        self.write(&self.keys.single(id), model, self.policy.single_ttl)
            .await
    }

    /// Removes a single entity, returns whether an entry was present
    pub async fn invalidate_single(&self, id: &M::Id) -> Result<bool, DomainError> {
        if !self.policy.single_enabled {
            return Ok(false);
        }

        let key = self.keys.single(id);
        let removed = self.store.delete(&key).await?;

        debug!(model = self.model(), key = %key, removed, "Invalidated cache entry");
        Ok(removed)
    }

    /// Removes every single-entity entry of the model type
    ///
    /// Best effort: entries written while the purge runs may survive.
    pub async fn invalidate_all_single(&self) -> Result<usize, DomainError> {
        let removed = self.store.delete_pattern(&self.keys.single_pattern()).await?;

        info!(model = self.model(), removed, "Purged single-entity cache");
        record_cache_invalidation(self.model(), CacheKind::Single, removed);
        Ok(removed)
    }

    /// Probes the cache for a single entity without decoding it
    pub async fn exists_single(&self, id: &M::Id) -> Result<bool, DomainError> {
        if !self.policy.single_enabled {
            return Ok(false);
        }

        self.store.exists(&self.keys.single(id)).await
    }

    /// Reads a filtered list, `Miss` without touching the store when disabled
    pub async fn lookup_list(&self, filter: Option<&Filter>) -> CacheLookup<Vec<M>> {
        if !self.policy.list_enabled {
            return CacheLookup::Miss;
        }

        self.read(&self.keys.list(filter), CacheKind::List).await
    }

    /// Fail-open list read, empty on miss
    pub async fn get_list(&self, filter: Option<&Filter>) -> Vec<M> {
        match self.lookup_list(filter).await {
            CacheLookup::StoreError(e) => {
                warn!(model = self.model(), error = %e, "List cache read failed, treating as miss");
                Vec::new()
            }
            lookup => lookup.hit().unwrap_or_default(),
        }
    }

    /// Caches a list with the policy TTL, absorbing failures
    ///
    /// Empty lists are cached too.
    pub async fn put_list(&self, filter: Option<&Filter>, models: &[M]) {
        self.put_list_with_ttl(filter, models, self.policy.list_ttl)
            .await;
    }

    /// Caches a list with an explicit TTL, absorbing failures
    pub async fn put_list_with_ttl(&self, filter: Option<&Filter>, models: &[M], ttl: Duration) {
        if !self.policy.list_enabled {
            return;
        }

        if let Err(e) = self.write(&self.keys.list(filter), models, ttl).await {
            warn!(model = self.model(), error = %e, "List cache write failed");
        }
    }

    /// Removes the list entry of one filter
    pub async fn invalidate_list(&self, filter: Option<&Filter>) -> Result<bool, DomainError> {
        if !self.policy.list_enabled {
            return Ok(false);
        }

        self.store.delete(&self.keys.list(filter)).await
    }

    /// Removes every list entry of the model type
    pub async fn invalidate_all_lists(&self) -> Result<usize, DomainError> {
        let removed = self.store.delete_pattern(&self.keys.list_pattern()).await?;

        info!(model = self.model(), removed, "Purged list cache");
        record_cache_invalidation(self.model(), CacheKind::List, removed);
        Ok(removed)
    }
}
