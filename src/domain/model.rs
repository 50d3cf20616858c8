//! Domain model abstraction served by data factories

use std::fmt::{Debug, Display};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Identifier type of a model
pub trait ModelId: Clone + Debug + Display + PartialEq + Send + Sync + 'static {}

impl<T> ModelId for T where T: Clone + Debug + Display + PartialEq + Send + Sync + 'static {}

/// A domain value with an identifier, cacheable as JSON
pub trait Model: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier type
    type Id: ModelId;

    /// Returns the identifier, absent for records not yet persisted
    fn id(&self) -> Option<&Self::Id>;

    /// Model type name used to derive cache keys
    ///
    /// Defaults to the unqualified Rust type name. Generic models should
    /// override it.
    fn model_type() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Last path segment of a type name (`app::orders::Order` -> `Order`)
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
