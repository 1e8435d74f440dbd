//! Configuration for MongoMemoryStore.
//!
//! Defines MongoStoreConfig, its default values, loading from environment
//! variables, and validation. Used when creating a store via
//! `MongoMemoryStore::connect` or `MongoMemoryStore::with_backend`.

use std::env;

use crate::dialect::ApiType;
use crate::error::{MongoStoreError, Result};
use crate::mapping::RESERVED_FIELDS;

/// Default number of documents sent per `insert_many` call.
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 100;
/// Default name of the vector search index.
pub const DEFAULT_INDEX_NAME: &str = "vectorSearchIndex";
/// Default document field holding the embedding.
pub const DEFAULT_EMBEDDING_KEY: &str = "embedding";
/// Default connection string.
pub const DEFAULT_CONNECTION_STRING: &str = "mongodb://localhost:27017";

/// Configuration for MongoMemoryStore.
///
/// # Fields
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | `vector_size` | `usize` | Dimension of every embedding in the store |
/// | `connection_string` | `String` | MongoDB / Cosmos DB connection string |
/// | `database_name` | `String` | Database holding the collections |
/// | `api_type` | `ApiType` | Which server-side vector search dialect to speak |
/// | `embedding_key` | `String` | Document field holding the embedding |
/// | `collection_name` | `String` | Working collection; must carry the search index |
/// | `index_name` | `String` | Name of the vector search index |
/// | `batch_size` | `usize` | Documents per `insert_many` during batch upsert |
#[derive(Debug, Clone, PartialEq)]
pub struct MongoStoreConfig {
    pub vector_size: usize,
    pub connection_string: String,
    pub database_name: String,
    pub api_type: ApiType,
    pub embedding_key: String,
    pub collection_name: String,
    pub index_name: String,
    pub batch_size: usize,
}

impl Default for MongoStoreConfig {
    /// Optional settings at their defaults. `database_name` and `collection_name`
    /// are left empty, so the result does not pass [`validate`](Self::validate)
    /// until both are set.
    fn default() -> Self {
        Self {
            vector_size: 1536,
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            database_name: String::new(),
            api_type: ApiType::Cosmos,
            embedding_key: DEFAULT_EMBEDDING_KEY.to_string(),
            collection_name: String::new(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }
}

impl MongoStoreConfig {
    /// Creates a config with the required fields set and defaults for the rest.
    pub fn new(
        vector_size: usize,
        database_name: impl Into<String>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            vector_size,
            database_name: database_name.into(),
            collection_name: collection_name.into(),
            ..Default::default()
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// `MONGODB_DATABASE`, `MONGODB_COLLECTION` and `MONGODB_VECTOR_SIZE` are required;
    /// `MONGODB_CONNECTION_STRING`, `MONGODB_API_TYPE`, `MONGODB_EMBEDDING_KEY`,
    /// `MONGODB_INDEX_NAME` and `MONGODB_INSERT_BATCH_SIZE` fall back to defaults.
    /// The result is validated before it is returned.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let database_name = required_var("MONGODB_DATABASE")?;
        let collection_name = required_var("MONGODB_COLLECTION")?;
        let vector_size = parse_usize("MONGODB_VECTOR_SIZE", &required_var("MONGODB_VECTOR_SIZE")?)?;
        let connection_string =
            env::var("MONGODB_CONNECTION_STRING").unwrap_or(defaults.connection_string);
        let api_type = match env::var("MONGODB_API_TYPE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.api_type,
        };
        let embedding_key = env::var("MONGODB_EMBEDDING_KEY").unwrap_or(defaults.embedding_key);
        let index_name = env::var("MONGODB_INDEX_NAME").unwrap_or(defaults.index_name);
        let batch_size = match env::var("MONGODB_INSERT_BATCH_SIZE") {
            Ok(value) => parse_usize("MONGODB_INSERT_BATCH_SIZE", &value)?,
            Err(_) => defaults.batch_size,
        };

        let config = Self {
            vector_size,
            connection_string,
            database_name,
            api_type,
            embedding_key,
            collection_name,
            index_name,
            batch_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants a store relies on. Nothing is contacted.
    pub fn validate(&self) -> Result<()> {
        if self.vector_size == 0 {
            return Err(config_error("vector_size must be a positive integer"));
        }
        if self.embedding_key.trim().is_empty() {
            return Err(config_error("embedding_key must be specified"));
        }
        if self.embedding_key.contains('.') || self.embedding_key.starts_with('$') {
            return Err(MongoStoreError::Config(format!(
                "embedding_key {:?} must be a plain field name (no '.' and no leading '$')",
                self.embedding_key
            )));
        }
        if RESERVED_FIELDS.contains(&self.embedding_key.as_str()) {
            return Err(MongoStoreError::Config(format!(
                "embedding_key {:?} collides with a reserved document field",
                self.embedding_key
            )));
        }
        if self.database_name.trim().is_empty() {
            return Err(config_error("database_name must be specified"));
        }
        if self.collection_name.trim().is_empty() {
            return Err(config_error("collection_name must be specified"));
        }
        if self.index_name.trim().is_empty() {
            return Err(config_error("index_name must be specified"));
        }
        if self.batch_size == 0 {
            return Err(config_error("batch_size must be a positive integer"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> MongoStoreError {
    MongoStoreError::Config(message.to_string())
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).map_err(|_| MongoStoreError::Config(format!("{} not set", name)))
}

fn parse_usize(name: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        MongoStoreError::Config(format!("{} must be a non-negative integer, got {:?}", name, value))
    })
}
