//! Query filter with canonical field ordering

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::DomainError;

/// Opaque query criteria made of named fields
///
/// Fields are kept in a sorted map, so two filters with the same fields and
/// values are equal and serialize identically regardless of insertion order.
/// `null` values are dropped: a field set to `null` is the same as no field.
///
/// A record matches when it contains the filter the way a JSONB `@>` query
/// does: objects match on a subset of their keys, arrays match when every
/// wanted element is contained in some element, scalars compare by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    fields: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the filter
    ///
    /// A value that fails to serialize is logged and skipped; use `try_with`
    /// to get the error instead.
    pub fn with<V: Serialize>(mut self, field: impl Into<String>, value: V) -> Self {
        self.insert(field, value);
        self
    }

    pub fn try_with<V: Serialize>(mut self, field: impl Into<String>, value: V) -> Result<Self, DomainError> {
        self.try_insert(field, value)?;
        Ok(self)
    }

    /// Inserts or replaces a field, leaving the filter unchanged on a serialization error
    pub fn insert<V: Serialize>(&mut self, field: impl Into<String>, value: V) {
        let field = field.into();

        if let Err(e) = self.try_insert(field.as_str(), value) {
            warn!(field = %field, error = %e, "Filter value does not serialize, field skipped");
        }
    }

    /// Inserts or replaces a field
    pub fn try_insert<V: Serialize>(&mut self, field: impl Into<String>, value: V) -> Result<(), DomainError> {
        let value = serde_json::to_value(value)?;
        let field = field.into();

        if value.is_null() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, canonicalize(value));
        }

        Ok(())
    }

    /// Builds a filter from any serializable criteria struct or map
    pub fn from_serializable<T: Serialize + ?Sized>(criteria: &T) -> Result<Self, DomainError> {
        match serde_json::to_value(criteria)? {
            Value::Object(map) => {
                let mut filter = Self::new();

                for (field, value) in map {
                    filter.insert(field, value);
                }

                Ok(filter)
            }
            Value::Null => Ok(Self::new()),
            other => Err(DomainError::validation(format!(
                "Filter criteria must serialize to an object, got: {}",
                other
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Serialized sorted field map, the input of list-key hashing
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_default()
    }

    /// Checks whether a serialized record contains every field of the filter
    pub fn matches(&self, record: &Value) -> bool {
        let Some(object) = record.as_object() else {
            return self.is_empty();
        };

        self.fields.iter().all(|(field, wanted)| {
            object
                .get(field)
                .is_some_and(|actual| contains(actual, wanted))
        })
    }
}

/// JSONB containment: does `actual` contain `wanted`
fn contains(actual: &Value, wanted: &Value) -> bool {
    match (actual, wanted) {
        (Value::Object(actual), Value::Object(wanted)) => wanted.iter().all(|(key, value)| {
            actual
                .get(key)
                .is_some_and(|present| contains(present, value))
        }),
        (Value::Array(actual), Value::Array(wanted)) => wanted
            .iter()
            .all(|value| actual.iter().any(|present| contains(present, value))),
        // 1 and 1.0 are the same JSONB number
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

/// Rebuilds nested objects with their keys in sorted order
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();

            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
