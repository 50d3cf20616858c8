use std::fmt;

use thiserror::Error;

/// Typed error code carried by factory-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    /// Machine readable error code
    pub code: &'static str,
    /// Message template key, resolved by the presentation layer
    pub message_template: &'static str,
    /// HTTP status an outer layer should answer with
    pub http_status: u16,
}

impl ErrorCode {
    pub const NOT_FOUND: ErrorCode = ErrorCode::new("96", "not-found", 400);
    pub const ID_IS_NULL: ErrorCode = ErrorCode::new("96", "ID_IS_NULL", 400);
    pub const CONVERT_ID_FAIL: ErrorCode = ErrorCode::new("96", "CONVERT_ID_FAIL", 400);

    pub const fn new(code: &'static str, message_template: &'static str, http_status: u16) -> Self {
        Self {
            code,
            message_template,
            http_status,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.code, self.message_template)
    }
}

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found [{code}]: {message}")]
    NotFound { code: ErrorCode, message: String },

    #[error("Conversion error [{code}]: {message}")]
    Conversion { code: ErrorCode, message: String },

    #[error("Cache error {code}: {description}")]
    Cache { code: String, description: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Factory error: {message}")]
    Factory {
        code: Option<ErrorCode>,
        message: String,
    },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            code: ErrorCode::CONVERT_ID_FAIL,
            message: message.into(),
        }
    }

    /// Cache backend failure with a generic code
    pub fn cache(description: impl Into<String>) -> Self {
        Self::cache_with_code("CACHE_ERROR", description)
    }

    pub fn cache_with_code(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Cache {
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Factory error carrying a typed code
    pub fn factory(code: ErrorCode) -> Self {
        Self::Factory {
            code: Some(code),
            message: code.message_template.to_string(),
        }
    }

    /// Factory error carrying free text only
    pub fn factory_message(message: impl Into<String>) -> Self {
        Self::Factory {
            code: None,
            message: message.into(),
        }
    }

    /// Returns the typed error code, if this error carries one
    pub fn error_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::NotFound { code, .. } | Self::Conversion { code, .. } => Some(code),
            Self::Factory { code, .. } => code.as_ref(),
            _ => None,
        }
    }

    /// HTTP status an outer layer should map this error to
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Conflict { .. } => 409,
            _ => self.error_code().map(|c| c.http_status).unwrap_or(500),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_cache(&self) -> bool {
        matches!(self, Self::Cache { .. })
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
