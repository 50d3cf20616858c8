//! Cache-aside data factories
//!
//! `CacheAsideEngine` owns the cache side for one model type, `DataFactory`
//! runs the read/write protocol against a `SourceOfTruth`, and
//! `PersistenceBoundFactory` plugs a `Storage` adapter in as that source.

mod data_factory;
mod engine;
mod persistence;
mod policy;

#[cfg(test)]
pub(crate) mod test_support;

pub use data_factory::{DataFactory, FactoryHooks, NoHooks, SourceOfTruth};
pub use engine::{CacheAsideEngine, CacheLookup};
pub use persistence::{
    convert_id, convert_id_via_codec, EntityBinding, PersistenceBoundFactory, PersistenceSource,
};
pub use policy::{CachePolicy, DEFAULT_TTL};
