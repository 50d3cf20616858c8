//! Domain layer - value types, contracts and errors shared by the data factories

pub mod cache;
pub mod codec;
pub mod error;
pub mod filter;
pub mod model;
pub mod storage;

pub use cache::{CacheStore, KeyCodec};
pub use codec::{CodecConfig, JsonCodec};
pub use error::{DomainError, ErrorCode};
pub use filter::Filter;
pub use model::{Model, ModelId};
pub use storage::{Storage, StorageEntity, StorageKey};
