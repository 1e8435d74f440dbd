//! Server-side vector search dialects.
//!
//! Azure Cosmos DB for MongoDB (vCore) and MongoDB Atlas expose vector search
//! through different aggregation stages and manage their vector indexes
//! differently. [`SearchDialect`] captures those differences; the store picks
//! one implementation from [`ApiType`] when it is constructed.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{doc, Document};

use crate::backend::MongoBackend;
use crate::error::{MongoStoreError, Result};
use crate::metric::SimilarityMetric;

/// Which MongoDB flavour the store talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiType {
    /// Azure Cosmos DB for MongoDB vCore (`cosmosSearch`, `vector-ivf` index)
    #[default]
    Cosmos,
    /// MongoDB Atlas (`$vectorSearch`, Atlas Search index)
    Atlas,
}

impl ApiType {
    /// Returns the search dialect for this API type.
    pub fn dialect(&self) -> Arc<dyn SearchDialect> {
        match self {
            ApiType::Cosmos => Arc::new(CosmosDialect),
            ApiType::Atlas => Arc::new(AtlasDialect),
        }
    }
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiType::Cosmos => f.write_str("azuremongodb"),
            ApiType::Atlas => f.write_str("mongodbatlas"),
        }
    }
}

impl FromStr for ApiType {
    type Err = MongoStoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azuremongodb" | "cosmos" | "cosmosdb" => Ok(ApiType::Cosmos),
            "mongodbatlas" | "atlas" => Ok(ApiType::Atlas),
            other => Err(MongoStoreError::Config(format!(
                "unknown api type {:?} (expected azuremongodb or mongodbatlas)",
                other
            ))),
        }
    }
}

/// Parameters for creating a collection together with its vector index.
#[derive(Debug, Clone)]
pub struct IndexSpec<'a> {
    pub collection_name: &'a str,
    pub index_name: &'a str,
    pub embedding_key: &'a str,
    pub vector_size: usize,
    pub metric: SimilarityMetric,
    pub num_lists: u32,
}

/// Parameters of a nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct VectorQuery<'a> {
    pub embedding: &'a [f32],
    pub embedding_key: &'a str,
    pub index_name: &'a str,
    pub limit: usize,
}

/// Dialect-specific collection provisioning, index lookup and search pipeline.
#[async_trait]
pub trait SearchDialect: Send + Sync {
    fn api_type(&self) -> ApiType;

    /// Creates the collection if it is absent, plus its vector index where the
    /// dialect can create one.
    async fn create_collection(&self, backend: &dyn MongoBackend, spec: &IndexSpec<'_>) -> Result<()>;

    /// Returns true if `index_name` exists on `collection_name`.
    async fn index_exists(
        &self,
        backend: &dyn MongoBackend,
        collection_name: &str,
        index_name: &str,
    ) -> Result<bool>;

    /// Builds the aggregation pipeline returning the nearest documents, best first.
    fn similarity_pipeline(&self, query: &VectorQuery<'_>) -> Vec<Document>;
}

/// Azure Cosmos DB for MongoDB vCore.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosmosDialect;

#[async_trait]
impl SearchDialect for CosmosDialect {
    fn api_type(&self) -> ApiType {
        ApiType::Cosmos
    }

    /// `createIndexes` creates the collection and its `vector-ivf` index in one command.
    async fn create_collection(&self, backend: &dyn MongoBackend, spec: &IndexSpec<'_>) -> Result<()> {
        let existing = backend.list_collection_names().await?;
        if existing.iter().any(|name| name == spec.collection_name) {
            return Ok(());
        }
        backend.run_command(cosmos_create_indexes_command(spec)).await?;
        Ok(())
    }

    async fn index_exists(
        &self,
        backend: &dyn MongoBackend,
        collection_name: &str,
        index_name: &str,
    ) -> Result<bool> {
        let names = backend.list_index_names(collection_name).await?;
        Ok(names.iter().any(|name| name == index_name))
    }

    fn similarity_pipeline(&self, query: &VectorQuery<'_>) -> Vec<Document> {
        vec![doc! {
            "$search": {
                "cosmosSearch": {
                    "vector": query.embedding.to_vec(),
                    "path": query.embedding_key,
                    "k": query.limit as i64,
                },
                "returnStoredSource": true,
            }
        }]
    }
}

/// MongoDB Atlas Vector Search.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtlasDialect;

#[async_trait]
impl SearchDialect for AtlasDialect {
    fn api_type(&self) -> ApiType {
        ApiType::Atlas
    }

    /// Creates the bare collection. Atlas Search indexes are defined outside the
    /// driver (Atlas UI / admin API), so no index is created here.
    async fn create_collection(&self, backend: &dyn MongoBackend, spec: &IndexSpec<'_>) -> Result<()> {
        let existing = backend.list_collection_names().await?;
        if existing.iter().any(|name| name == spec.collection_name) {
            return Ok(());
        }
        backend.create_collection(spec.collection_name).await
    }

    async fn index_exists(
        &self,
        backend: &dyn MongoBackend,
        collection_name: &str,
        index_name: &str,
    ) -> Result<bool> {
        let names = backend.list_search_index_names(collection_name).await?;
        Ok(names.iter().any(|name| name == index_name))
    }

    fn similarity_pipeline(&self, query: &VectorQuery<'_>) -> Vec<Document> {
        vec![doc! {
            "$vectorSearch": {
                "index": query.index_name,
                "path": query.embedding_key,
                "queryVector": query.embedding.to_vec(),
                "numCandidates": atlas_num_candidates(query.limit),
                "limit": query.limit as i64,
            }
        }]
    }
}

/// Upper bound Atlas accepts for `numCandidates`.
pub const ATLAS_MAX_NUM_CANDIDATES: i64 = 10_000;

/// Candidates considered by `$vectorSearch`: ten per requested result, at least
/// 100 and at most [`ATLAS_MAX_NUM_CANDIDATES`].
fn atlas_num_candidates(limit: usize) -> i64 {
    i64::try_from(limit)
        .unwrap_or(i64::MAX)
        .saturating_mul(10)
        .clamp(100, ATLAS_MAX_NUM_CANDIDATES)
}

fn cosmos_create_indexes_command(spec: &IndexSpec<'_>) -> Document {
    doc! {
        "createIndexes": spec.collection_name,
        "indexes": [
            {
                "name": spec.index_name,
                "key": { spec.embedding_key: "cosmosSearch" },
                "cosmosSearchOptions": {
                    "kind": "vector-ivf",
                    "numLists": i64::from(spec.num_lists),
                    "similarity": spec.metric.as_cosmos_similarity(),
                    "dimensions": spec.vector_size as i64,
                },
            }
        ],
    }
}
