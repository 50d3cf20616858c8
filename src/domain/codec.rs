//! JSON serialization codec
//!
//! Cache engines never reach for a global mapper; a `JsonCodec` is built once
//! and handed to every engine that needs one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::domain::DomainError;

/// Codec behaviour switches
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Map malformed top-level scalar fields to `null` instead of failing the
    /// whole conversion
    pub lenient_scalars: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            lenient_scalars: true,
        }
    }
}

/// Structural JSON codec tolerant of unknown and malformed fields
#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    config: CodecConfig,
}

/// Location of a scalar that may be relaxed to `null`
#[derive(Debug, Clone)]
enum ScalarPath {
    Field(String),
    Element(usize, String),
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Codec that reports every malformed field as an error
    pub fn strict() -> Self {
        Self::with_config(CodecConfig {
            lenient_scalars: false,
        })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Serializes a value to its JSON text form
    pub fn encode<T>(&self, value: &T) -> Result<String, DomainError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_string(value)
            .map_err(|e| DomainError::serialization(format!("Failed to encode value: {}", e)))
    }

    /// Deserializes JSON text into a typed value
    pub fn decode<T>(&self, data: &str) -> Result<T, DomainError>
    where
        T: DeserializeOwned,
    {
        let value: Value = serde_json::from_str(data)
            .map_err(|e| DomainError::serialization(format!("Failed to parse value: {}", e)))?;

        self.from_value(value)
    }

    /// Serializes a value into a JSON tree
    pub fn to_value<T>(&self, value: &T) -> Result<Value, DomainError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_value(value)
            .map_err(|e| DomainError::serialization(format!("Failed to encode value: {}", e)))
    }

    /// Builds a typed value from a JSON tree
    pub fn from_value<T>(&self, value: Value) -> Result<T, DomainError>
    where
        T: DeserializeOwned,
    {
        let result = if self.config.lenient_scalars {
            Self::relaxed::<T>(value)
        } else {
            serde_json::from_value(value)
        };

        result.map_err(|e| DomainError::serialization(format!("Failed to decode value: {}", e)))
    }

    /// Converts one structure into another through their JSON representation
    pub fn convert<S, T>(&self, value: &S) -> Result<T, DomainError>
    where
        S: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.from_value(self.to_value(value)?)
    }

    fn relaxed<T>(value: Value) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        let mut current = value;
        let mut last_error = match serde_json::from_value::<T>(current.clone()) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => e.to_string(),
        };

        for path in Self::scalar_paths(&current) {
            let mut candidate = current.clone();
            Self::set_null(&mut candidate, &path);

            match serde_json::from_value::<T>(candidate.clone()) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => {
                    let message = e.to_string();

                    // Keep the relaxation only when it cleared the reported
                    // problem without tripping a non-nullable field.
                    if message != last_error && !message.contains("invalid type: null") {
                        current = candidate;
                        last_error = message;
                    }
                }
            }
        }

        serde_json::from_value(current)
    }

    fn scalar_paths(value: &Value) -> Vec<ScalarPath> {
        let is_scalar = |v: &Value| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_));

        match value {
            Value::Object(map) => map
                .iter()
                .filter(|(_, v)| is_scalar(v))
                .map(|(k, _)| ScalarPath::Field(k.clone()))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| item.as_object().map(|map| (i, map)))
                .flat_map(|(i, map)| {
                    map.iter()
                        .filter(|(_, v)| is_scalar(v))
                        .map(move |(k, _)| ScalarPath::Element(i, k.clone()))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn set_null(value: &mut Value, path: &ScalarPath) {
        let slot = match path {
            ScalarPath::Field(field) => value.get_mut(field.as_str()),
            ScalarPath::Element(index, field) => value
                .get_mut(*index)
                .and_then(|item| item.get_mut(field.as_str())),
        };

        if let Some(slot) = slot {
            *slot = Value::Null;
        }
    }
}
