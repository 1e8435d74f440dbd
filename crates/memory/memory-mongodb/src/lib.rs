//! # MongoDB Memory Store
//!
//! Vector memory storage on MongoDB Atlas or Azure Cosmos DB for MongoDB (vCore).
//!
//! ## Features
//!
//! - **MemoryStore** trait implementation over a MongoDB database
//! - **Two search dialects**: Cosmos `cosmosSearch` (`vector-ivf` index) and Atlas `$vectorSearch`
//! - **Batched upsert** with a configurable `insert_many` batch size
//! - **Fail-fast construction**: a store is never created for a collection without its search index
//!
//! Similarity scoring, ranking and index traversal run on the server; this crate
//! shapes the queries and maps documents to [`MemoryRecord`](memory_core::MemoryRecord)s.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memory_core::MemoryRecord;
//! use memory_mongodb::{MongoMemoryStore, MongoStoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MongoStoreConfig::new(3, "semantic_kernel", "memories");
//! let store = MongoMemoryStore::connect(config).await?;
//!
//! let id = store
//!     .upsert("memories", MemoryRecord::new("Hello world", vec![1.0, 0.0, 0.0]))
//!     .await?;
//!
//! let nearest = store.get_nearest_matches("memories", &[0.9, 0.1, 0.0], 5).await?;
//! # let _ = (id, nearest);
//! store.close().await;
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod dialect;
mod error;
mod mapping;
mod metric;
mod store;

pub use backend::{DriverBackend, MongoBackend};
pub use config::{
    MongoStoreConfig, DEFAULT_CONNECTION_STRING, DEFAULT_EMBEDDING_KEY, DEFAULT_INDEX_NAME,
    DEFAULT_INSERT_BATCH_SIZE,
};
pub use dialect::{
    ApiType, AtlasDialect, ATLAS_MAX_NUM_CANDIDATES, CosmosDialect, IndexSpec, SearchDialect, VectorQuery,
};
pub use error::{MongoStoreError, Result};
pub use mapping::{document_to_record, record_to_document};
pub use metric::SimilarityMetric;
pub use store::{MongoMemoryStore, DEFAULT_NUM_LISTS};
