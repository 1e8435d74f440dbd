//! Similarity metrics for the vector index.
//!
//! Used by `MongoMemoryStore::create_collection_with` when the Cosmos dialect
//! builds its `vector-ivf` index.

use std::fmt;
use std::str::FromStr;

use crate::error::MongoStoreError;

/// Similarity metrics for vector search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityMetric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Euclidean (L2) distance
    Euclidean,
    /// Inner (dot) product
    DotProduct,
}

impl SimilarityMetric {
    /// Name of the metric in Cosmos `cosmosSearchOptions.similarity`.
    pub fn as_cosmos_similarity(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "COS",
            SimilarityMetric::Euclidean => "L2",
            SimilarityMetric::DotProduct => "IP",
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cosmos_similarity())
    }
}

impl FromStr for SimilarityMetric {
    type Err = MongoStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cos" | "cosine" => Ok(SimilarityMetric::Cosine),
            "l2" | "euclidean" => Ok(SimilarityMetric::Euclidean),
            "ip" | "dot" | "dotproduct" | "dot_product" => Ok(SimilarityMetric::DotProduct),
            other => Err(MongoStoreError::Config(format!(
                "unknown similarity metric {:?} (expected COS, L2 or IP)",
                other
            ))),
        }
    }
}
