//! Error types for the Recall vector store.
//!
//! This module defines a unified error enum covering every failure a store
//! operation can surface: lifecycle conflicts, missing collections or
//! documents, embedding dimension violations, and opaque backend failures,
//! plus the ambient configuration, I/O and serialization errors.

use thiserror::Error;

/// Unified error type for Recall.
///
/// All fallible functions return `Result<T, AppError>`.
/// Backend failures are propagated, never swallowed.
#[derive(Error, Debug)]
pub enum AppError {
    /// A collection or document required by the operation does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Collection creation conflicts with an existing collection
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Non-upsert insert of an id that is already stored
    #[error("Duplicate key '{id}' in collection '{collection}'")]
    DuplicateKey { collection: String, id: String },

    /// Embedding length differs from the collection's fixed dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Underlying storage failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Shorthand for a missing collection.
    pub fn collection_not_found(name: &str) -> Self {
        AppError::NotFound(format!("collection '{}'", name))
    }

    /// Whether this error reports an absent collection or document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
