//! Order fixtures shared by the factory tests

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::domain::cache::CacheStore;
use crate::domain::codec::JsonCodec;
use crate::domain::filter::Filter;
use crate::domain::model::Model;
use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;
use crate::infrastructure::storage::InMemoryStorage;

use super::engine::CacheAsideEngine;
use super::persistence::{convert_id, EntityBinding, PersistenceBoundFactory};
use super::policy::CachePolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<i64>,
    pub status: String,
    pub region: String,
}

impl Order {
    /// Order not yet persisted
    pub fn draft(status: &str) -> Self {
        Self {
            id: None,
            status: status.to_string(),
            region: "eu".to_string(),
        }
    }

    pub fn in_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }
}

impl Model for Order {
    type Id = i64;

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }
}

pub fn order(id: i64, status: &str) -> Order {
    Order {
        id: Some(id),
        ..Order::draft(status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEntity {
    pub id: u32,
    pub status: String,
    pub region: String,
    pub revision: u32,
}

impl StorageEntity for OrderEntity {
    type Key = u32;

    fn key(&self) -> &u32 {
        &self.id
    }
}

/// Filter-aware binding with a key sequence for drafts
#[derive(Debug)]
pub struct OrderBinding {
    next_id: AtomicI64,
}

impl Default for OrderBinding {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
        }
    }
}

#[async_trait]
impl EntityBinding<Order, OrderEntity> for OrderBinding {
    fn to_model(&self, entity: &OrderEntity) -> Result<Order, DomainError> {
        Ok(Order {
            id: Some(i64::from(entity.id)),
            status: entity.status.clone(),
            region: entity.region.clone(),
        })
    }

    fn to_new_entity(&self, model: &Order) -> Result<OrderEntity, DomainError> {
        let id = match model.id {
            Some(id) => id,
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };

        Ok(OrderEntity {
            id: self.entity_id(&id)?,
            status: model.status.clone(),
            region: model.region.clone(),
            revision: 0,
        })
    }

    fn apply_update(&self, model: &Order, existing: OrderEntity) -> Result<OrderEntity, DomainError> {
        Ok(OrderEntity {
            status: model.status.clone(),
            region: model.region.clone(),
            revision: existing.revision + 1,
            ..existing
        })
    }

    fn entity_id(&self, id: &i64) -> Result<u32, DomainError> {
        convert_id(id)
    }

    async fn find_entity(
        &self,
        storage: &dyn Storage<OrderEntity>,
        id: Option<&i64>,
        filter: Option<&Filter>,
    ) -> Result<Option<OrderEntity>, DomainError> {
        match (id, filter) {
            (Some(id), _) => storage.find_by_id(&self.entity_id(id)?).await,
            (None, Some(filter)) => Ok(storage.find_matching(filter).await?.into_iter().next()),
            (None, None) => Ok(None),
        }
    }

    async fn list_entities(
        &self,
        storage: &dyn Storage<OrderEntity>,
        filter: Option<&Filter>,
    ) -> Result<Vec<OrderEntity>, DomainError> {
        match filter {
            Some(filter) => storage.find_matching(filter).await,
            None => storage.find_all().await,
        }
    }

    async fn entity_exists(
        &self,
        storage: &dyn Storage<OrderEntity>,
        id: Option<&i64>,
        filter: Option<&Filter>,
    ) -> Result<bool, DomainError> {
        Ok(self.find_entity(storage, id, filter).await?.is_some())
    }
}

/// Storage wrapper counting reads that reach persistence
#[derive(Debug)]
pub struct CountingStorage<E: StorageEntity> {
    inner: InMemoryStorage<E>,
    find_by_id: AtomicUsize,
    list: AtomicUsize,
}

impl<E: StorageEntity> CountingStorage<E> {
    pub fn new(inner: InMemoryStorage<E>) -> Self {
        Self {
            inner,
            find_by_id: AtomicUsize::new(0),
            list: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryStorage<E> {
        &self.inner
    }

    pub fn find_by_id_calls(&self) -> usize {
        self.find_by_id.load(Ordering::SeqCst)
    }

    /// Calls to `find_all` and `find_matching`
    pub fn list_calls(&self) -> usize {
        self.list.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<E: StorageEntity> Storage<E> for CountingStorage<E> {
    async fn find_by_id(&self, id: &E::Key) -> Result<Option<E>, DomainError> {
        self.find_by_id.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn find_all(&self) -> Result<Vec<E>, DomainError> {
        self.list.fetch_add(1, Ordering::SeqCst);
        self.inner.find_all().await
    }

    async fn find_matching(&self, filter: &Filter) -> Result<Vec<E>, DomainError> {
        self.list.fetch_add(1, Ordering::SeqCst);
        self.inner.find_matching(filter).await
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        self.inner.save(entity).await
    }

    async fn delete(&self, entity: &E) -> Result<bool, DomainError> {
        self.inner.delete(entity).await
    }

    async fn exists_by_id(&self, id: &E::Key) -> Result<bool, DomainError> {
        self.inner.exists_by_id(id).await
    }

    async fn count(&self) -> Result<u64, DomainError> {
        self.inner.count().await
    }
}

/// Storage whose first `find_by_id` stalls after reading
///
/// The stalled read holds the value it saw until `release` is notified, so a
/// test can run a write between a load and its cache fill.
#[derive(Debug)]
pub struct GatedStorage<E: StorageEntity> {
    inner: InMemoryStorage<E>,
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

impl<E: StorageEntity> GatedStorage<E> {
    pub fn new(inner: InMemoryStorage<E>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Notified once the stalled read has its result
    pub fn reached(&self) -> &Notify {
        &self.reached
    }

    pub fn release(&self) -> &Notify {
        &self.release
    }
}

#[async_trait]
impl<E: StorageEntity> Storage<E> for GatedStorage<E> {
    async fn find_by_id(&self, id: &E::Key) -> Result<Option<E>, DomainError> {
        let found = self.inner.find_by_id(id).await;

        if self.armed.swap(false, Ordering::SeqCst) {
            // notify_one stores a permit, so neither side can miss the other
            self.reached.notify_one();
            self.release.notified().await;
        }

        found
    }

    async fn find_all(&self) -> Result<Vec<E>, DomainError> {
        self.inner.find_all().await
    }

    async fn find_matching(&self, filter: &Filter) -> Result<Vec<E>, DomainError> {
        self.inner.find_matching(filter).await
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        self.inner.save(entity).await
    }

    async fn delete(&self, entity: &E) -> Result<bool, DomainError> {
        self.inner.delete(entity).await
    }

    async fn exists_by_id(&self, id: &E::Key) -> Result<bool, DomainError> {
        self.inner.exists_by_id(id).await
    }

    async fn count(&self) -> Result<u64, DomainError> {
        self.inner.count().await
    }
}

pub type OrderFactory = PersistenceBoundFactory<Order, OrderEntity, OrderBinding>;

fn seed_entities(binding: &OrderBinding, seed: &[Order]) -> InMemoryStorage<OrderEntity> {
    let entities = seed
        .iter()
        .map(|model| binding.to_new_entity(model))
        .collect::<Result<Vec<_>, _>>()
        .expect("seed orders must convert");

    InMemoryStorage::with_entities(entities)
}

/// Order factory over a counting in-memory store, default policy
pub fn order_factory(
    store: Arc<dyn CacheStore>,
    seed: Vec<Order>,
) -> (OrderFactory, Arc<CountingStorage<OrderEntity>>) {
    order_factory_with(store, CachePolicy::default(), seed)
}

pub fn order_factory_with(
    store: Arc<dyn CacheStore>,
    policy: CachePolicy,
    seed: Vec<Order>,
) -> (OrderFactory, Arc<CountingStorage<OrderEntity>>) {
    let binding = OrderBinding::default();
    let storage = Arc::new(CountingStorage::new(seed_entities(&binding, &seed)));
    let engine = CacheAsideEngine::new(store, Arc::new(JsonCodec::new()), policy);
    let factory = OrderFactory::bind(engine, storage.clone(), binding);

    (factory, storage)
}

/// Order factory whose first read by id stalls until released
pub fn gated_order_factory(
    store: Arc<dyn CacheStore>,
    seed: Vec<Order>,
) -> (OrderFactory, Arc<GatedStorage<OrderEntity>>) {
    let binding = OrderBinding::default();
    let storage = Arc::new(GatedStorage::new(seed_entities(&binding, &seed)));
    let engine = CacheAsideEngine::new(store, Arc::new(JsonCodec::new()), CachePolicy::default());
    let factory = OrderFactory::bind(engine, storage.clone(), binding);

    (factory, storage)
}
