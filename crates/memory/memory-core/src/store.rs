//! # Memory Storage
//!
//! This module defines the memory storage interface for storing and retrieving
//! [`MemoryRecord`]s grouped into named collections.
//!
//! The `MemoryStore` trait is implemented by storage backends (MongoDB / Cosmos DB, ...).

use async_trait::async_trait;

use crate::types::MemoryRecord;

/// Trait for storing, retrieving and searching memory records.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Creates a collection (and its vector index, where the backend supports it)
    /// if it does not exist yet.
    async fn create_collection(&self, collection_name: &str) -> Result<(), anyhow::Error>;

    /// Lists the collection names.
    async fn get_collections(&self) -> Result<Vec<String>, anyhow::Error>;

    /// Deletes a collection. Deleting a missing collection is not an error.
    async fn delete_collection(&self, collection_name: &str) -> Result<(), anyhow::Error>;

    /// Returns true if the collection exists.
    async fn does_collection_exist(&self, collection_name: &str) -> Result<bool, anyhow::Error>;

    /// Upserts a single record. Returns the id when the record was newly inserted,
    /// `None` when an existing record was updated in place.
    async fn upsert(
        &self,
        collection_name: &str,
        record: MemoryRecord,
    ) -> Result<Option<String>, anyhow::Error> {
        let ids = self.upsert_batch(collection_name, vec![record]).await?;
        Ok(ids.into_iter().next())
    }

    /// Upserts a batch of records. Returns the ids of newly inserted records only.
    async fn upsert_batch(
        &self,
        collection_name: &str,
        records: Vec<MemoryRecord>,
    ) -> Result<Vec<String>, anyhow::Error>;

    /// Retrieves a record by key. Returns `None` if not found.
    async fn get(&self, collection_name: &str, key: &str)
        -> Result<Option<MemoryRecord>, anyhow::Error>;

    /// Retrieves the records for the given keys; missing keys are omitted.
    async fn get_batch(
        &self,
        collection_name: &str,
        keys: &[String],
    ) -> Result<Vec<MemoryRecord>, anyhow::Error>;

    /// Removes a record by key. Removing a missing key is not an error.
    async fn remove(&self, collection_name: &str, key: &str) -> Result<(), anyhow::Error>;

    /// Removes the records for the given keys, each independently.
    async fn remove_batch(&self, collection_name: &str, keys: &[String])
        -> Result<(), anyhow::Error>;

    /// Returns up to `limit` records nearest to `embedding`, best match first.
    async fn get_nearest_matches(
        &self,
        collection_name: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, anyhow::Error>;

    /// Returns the single nearest record, or `None` for an empty collection.
    async fn get_nearest_match(
        &self,
        collection_name: &str,
        embedding: &[f32],
    ) -> Result<Option<MemoryRecord>, anyhow::Error> {
        let matches = self.get_nearest_matches(collection_name, embedding, 1).await?;
        Ok(matches.into_iter().next())
    }

    /// Releases the underlying connection. Safe to call more than once.
    async fn close(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
