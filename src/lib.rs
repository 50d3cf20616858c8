//! Data Factory
//!
//! A generic cache-aside data access layer:
//! - Deterministic cache keys for single entities and filtered lists
//! - Per-model cache policy (enable flags, TTLs)
//! - CRUD factories that keep a key-value cache in step with a persistent store
//! - In-memory and Redis caches, in-memory and PostgreSQL storage

pub mod cli;
pub mod config;
pub mod domain;
pub mod factory;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{DomainError, Filter, JsonCodec, Model};
pub use factory::{CacheAsideEngine, CachePolicy, DataFactory, PersistenceBoundFactory};
