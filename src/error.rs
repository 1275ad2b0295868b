//! Error types for cache operations
//!
//! This module defines the error type for the ouroboros-cache library.
//! Eviction no-ops are not errors: an eviction whose target state has been
//! superseded silently does nothing.

use crate::schema::ValidationErrors;
use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The request tree is not compatible with the schema tree
    #[error("Request is incompatible with schema:\n{0}")]
    Incompatible(ValidationErrors),

    /// Write input does not have the shape the schema node expects
    #[error("Shape mismatch at {path}: expected {expected}, found {found}")]
    ShapeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// A sum write named a typename the schema does not declare
    #[error("Unknown member `{typename}` for sum at {path}")]
    UnknownSumMember { path: String, typename: String },

    /// A sum write without `__typename` while no member is set
    #[error("Missing __typename for sum at {path}")]
    MissingTypename { path: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Persistence hook failure
    #[error("Persistence error: {0}")]
    PersistError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}
