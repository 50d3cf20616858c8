//! Cache key derivation for single entities and filtered lists

use std::fmt::Display;

use sha2::{Digest, Sha256};

use crate::domain::filter::Filter;

/// Segment marking list-level cache entries
pub const LIST_PREFIX: &str = "cache_list";

/// Separator between key segments
pub const SEPARATOR: &str = ":";

/// Derives deterministic, lower-cased cache keys for one model type
///
/// Single entities live under `<model>:<id>`, filtered lists under
/// `cache_list:<model>:<digest>` where the digest hashes the model type and the
/// canonical (sorted) filter fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    model_type: String,
}

impl KeyCodec {
    /// Creates a codec bound to a model type name
    pub fn for_model(model_type: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into().to_lowercase(),
        }
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    /// Key of a single entity
    pub fn single(&self, id: &impl Display) -> String {
        Self::single_key(&self.model_type, id)
    }

    /// Key of a filtered list
    pub fn list(&self, filter: Option<&Filter>) -> String {
        Self::list_key(&self.model_type, filter)
    }

    /// Glob matching every single-entity key of the model type
    pub fn single_pattern(&self) -> String {
        format!("{}{}*", self.model_type, SEPARATOR)
    }

    /// Glob matching every list key of the model type
    pub fn list_pattern(&self) -> String {
        format!("{}{}{}{}*", LIST_PREFIX, SEPARATOR, self.model_type, SEPARATOR)
    }

    /// `<model>:<id>`, lower-cased
    pub fn single_key(model_type: &str, id: &impl Display) -> String {
        format!("{}{}{}", model_type, SEPARATOR, id).to_lowercase()
    }

    /// `cache_list:<model>:<digest>`, lower-cased
    ///
    /// An absent or empty filter hashes the model type alone.
    pub fn list_key(model_type: &str, filter: Option<&Filter>) -> String {
        let model_type = model_type.to_lowercase();
        let mut input = format!("{}{}{}", model_type, SEPARATOR, LIST_PREFIX);

        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            input.push_str(&filter.canonical_json());
        }

        format!(
            "{}{}{}{}{}",
            LIST_PREFIX,
            SEPARATOR,
            model_type,
            SEPARATOR,
            Self::digest(&input)
        )
    }

    /// First 64 bits of SHA-256, hex encoded (16 characters)
    fn digest(input: &str) -> String {
        let hash = Sha256::digest(input.as_bytes());
        hex::encode(&hash[..8])
    }
}
