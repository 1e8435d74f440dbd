//! MongoDB memory store error types.
//!
//! Returned by every fallible operation of the store and its backends.

use thiserror::Error;

/// Errors that can occur when using the MongoDB memory store.
#[derive(Error, Debug)]
pub enum MongoStoreError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Search index {index:?} does not exist on collection {collection:?}")]
    MissingIndex { collection: String, index: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("MongoDB error: {0}")]
    Backend(#[from] mongodb::error::Error),
}

pub type Result<T> = std::result::Result<T, MongoStoreError>;
