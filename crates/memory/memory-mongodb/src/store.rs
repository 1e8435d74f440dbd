//! MongoDB-based memory store implementation.
//!
//! Provides collection administration, batched upsert, point/batch lookup and
//! delete, and nearest-neighbour search delegated to the server, plus the
//! MemoryStore trait impl. External: memory-core (MemoryStore, MemoryRecord), mongodb.

use std::sync::Arc;

use async_trait::async_trait;
use memory_core::{MemoryRecord, MemoryStore};
use mongodb::bson::{doc, Bson, Document};
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use crate::backend::{DriverBackend, MongoBackend};
use crate::config::MongoStoreConfig;
use crate::dialect::{IndexSpec, SearchDialect, VectorQuery};
use crate::error::{MongoStoreError, Result};
use crate::mapping::{document_to_record, record_to_document, ID_FIELD};
use crate::metric::SimilarityMetric;

/// Default number of IVF lists for a new Cosmos vector index.
pub const DEFAULT_NUM_LISTS: u32 = 100;

/// Memory store backed by MongoDB Atlas or Azure Cosmos DB for MongoDB.
///
/// The store validates its configuration and checks that the configured
/// vector search index exists on the working collection before it is handed
/// out. Vector search itself runs on the server.
///
/// Batch upsert checks each id before writing it; the check and the write are
/// not atomic, so concurrent upserts of the same id can race.
pub struct MongoMemoryStore {
    config: MongoStoreConfig,
    backend: Arc<dyn MongoBackend>,
    dialect: Arc<dyn SearchDialect>,
    span: Span,
}

impl MongoMemoryStore {
    /// Connects to the deployment described by `config`.
    ///
    /// # Errors
    ///
    /// - [`MongoStoreError::Config`] if the configuration is invalid (nothing is opened)
    /// - [`MongoStoreError::MissingIndex`] if the search index is absent (the client is closed)
    /// - [`MongoStoreError::Backend`] if the driver fails
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = MongoStoreConfig::new(1536, "sk", "memories");
    /// let store = MongoMemoryStore::connect(config).await?;
    /// ```
    pub async fn connect(config: MongoStoreConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn MongoBackend> = Arc::new(
            DriverBackend::connect(&config.connection_string, &config.database_name).await?,
        );
        Self::with_owned_backend(config, backend).await
    }

    /// Creates a store that owns `backend`: if construction fails the handle is
    /// shut down before the error is returned.
    pub async fn with_owned_backend(config: MongoStoreConfig, backend: Arc<dyn MongoBackend>) -> Result<Self> {
        match Self::with_backend(config, Arc::clone(&backend)).await {
            Ok(store) => Ok(store),
            Err(e) => {
                backend.shutdown().await;
                Err(e)
            }
        }
    }

    /// Creates a store over an existing database handle.
    ///
    /// Performs the same validation and index check as [`connect`](Self::connect)
    /// but leaves the handle open on failure.
    pub async fn with_backend(config: MongoStoreConfig, backend: Arc<dyn MongoBackend>) -> Result<Self> {
        config.validate()?;
        let dialect = config.api_type.dialect();
        let span = info_span!(
            "mongodb_memory_store",
            database = %config.database_name,
            collection = %config.collection_name,
            api_type = %config.api_type,
        );

        let index_found = dialect
            .index_exists(backend.as_ref(), &config.collection_name, &config.index_name)
            .await?;
        if !index_found {
            warn!(
                parent: &span,
                index = %config.index_name,
                "Vector search index missing, refusing to create store"
            );
            return Err(MongoStoreError::MissingIndex {
                collection: config.collection_name.clone(),
                index: config.index_name.clone(),
            });
        }

        info!(parent: &span, index = %config.index_name, "MongoDB memory store ready");
        Ok(Self {
            config,
            backend,
            dialect,
            span,
        })
    }

    /// Replaces the span all store events are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &MongoStoreConfig {
        &self.config
    }

    /// The working collection the store was constructed against.
    pub fn collection_name(&self) -> &str {
        &self.config.collection_name
    }

    /// Releases the connection. Idempotent.
    pub async fn close(&self) {
        self.backend.shutdown().await;
    }

    /// Creates a collection if it does not exist.
    ///
    /// On Cosmos DB this also creates the `vector-ivf` index named by the config,
    /// with `num_lists` clusters and the given metric. On Atlas only the bare
    /// collection is created; its search index must be defined in Atlas.
    pub async fn create_collection_with(
        &self,
        collection_name: &str,
        metric: SimilarityMetric,
        num_lists: u32,
    ) -> Result<()> {
        info!(
            parent: &self.span,
            collection_name = %collection_name,
            metric = %metric,
            num_lists,
            "Creating collection"
        );
        let spec = IndexSpec {
            collection_name,
            index_name: &self.config.index_name,
            embedding_key: &self.config.embedding_key,
            vector_size: self.config.vector_size,
            metric,
            num_lists,
        };
        self.dialect.create_collection(self.backend.as_ref(), &spec).await
    }

    pub async fn get_collections(&self) -> Result<Vec<String>> {
        self.backend.list_collection_names().await
    }

    /// Drops a collection without checking that it exists.
    pub async fn delete_collection(&self, collection_name: &str) -> Result<()> {
        info!(parent: &self.span, collection_name = %collection_name, "Dropping collection");
        self.backend.drop_collection(collection_name).await
    }

    pub async fn does_collection_exist(&self, collection_name: &str) -> Result<bool> {
        let names = self.backend.list_collection_names().await?;
        Ok(names.iter().any(|name| name == collection_name))
    }

    pub async fn does_index_exist(&self, collection_name: &str, index_name: &str) -> Result<bool> {
        self.dialect
            .index_exists(self.backend.as_ref(), collection_name, index_name)
            .await
    }

    /// Upserts one record; see [`upsert_batch`](Self::upsert_batch).
    pub async fn upsert(&self, collection_name: &str, record: MemoryRecord) -> Result<Option<String>> {
        let ids = self.upsert_batch(collection_name, vec![record]).await?;
        Ok(ids.into_iter().next())
    }

    /// Upserts records and returns the ids of the ones that were inserted.
    ///
    /// Records without an id get a UUID v4. Each id is looked up first: existing
    /// documents are updated in place and their ids are not returned; new
    /// documents are buffered and written with one `insert_many` per
    /// `batch_size` documents. Embedding sizes are checked before any write.
    pub async fn upsert_batch(&self, collection_name: &str, records: Vec<MemoryRecord>) -> Result<Vec<String>> {
        for record in &records {
            self.check_dimension(record.embedding.len())?;
        }

        let total = records.len();
        info!(
            parent: &self.span,
            collection_name = %collection_name,
            count = total,
            "Upserting records to MongoDB memory store"
        );

        let mut pending: Vec<Document> = Vec::new();
        let mut inserted_ids: Vec<String> = Vec::new();
        let mut updated = 0usize;

        for mut record in records {
            if record.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                record.id = Some(Uuid::new_v4().to_string());
            }
            let id = record.id.clone().unwrap_or_default();

            let document = record_to_document(&record, &self.config.embedding_key);
            let filter = doc! { ID_FIELD: id.as_str() };

            if self.backend.find_one(collection_name, filter.clone()).await?.is_some() {
                let mut fields = document;
                fields.remove(ID_FIELD);
                let modified = self
                    .backend
                    .update_one(collection_name, filter, doc! { "$set": fields })
                    .await?;
                if modified > 0 {
                    debug!(parent: &self.span, id = %id, "Updated existing document");
                }
                updated += 1;
            } else {
                pending.push(document);
                if pending.len() >= self.config.batch_size {
                    inserted_ids.extend(self.flush_inserts(collection_name, &mut pending).await?);
                }
            }
        }

        if !pending.is_empty() {
            inserted_ids.extend(self.flush_inserts(collection_name, &mut pending).await?);
        }

        info!(
            parent: &self.span,
            collection_name = %collection_name,
            inserted = inserted_ids.len(),
            updated,
            "MongoDB memory store upsert returned"
        );
        Ok(inserted_ids)
    }

    /// Writes the buffered documents with one `insert_many` and empties the buffer.
    async fn flush_inserts(&self, collection_name: &str, pending: &mut Vec<Document>) -> Result<Vec<String>> {
        let documents = std::mem::take(pending);
        debug!(
            parent: &self.span,
            collection_name = %collection_name,
            count = documents.len(),
            "Flushing insert batch"
        );
        let ids = self.backend.insert_many(collection_name, documents).await?;
        Ok(ids.into_iter().map(bson_id_to_string).collect())
    }

    pub async fn get(&self, collection_name: &str, key: &str) -> Result<Option<MemoryRecord>> {
        debug!(parent: &self.span, collection_name = %collection_name, key = %key, "Querying MongoDB memory store by id");
        let document = self
            .backend
            .find_one(collection_name, doc! { ID_FIELD: key })
            .await?;
        let record = document
            .map(|d| document_to_record(&d, &self.config.embedding_key))
            .transpose()?;
        debug!(parent: &self.span, key = %key, found = record.is_some(), "MongoDB memory store get returned");
        Ok(record)
    }

    /// Returns records for the keys that exist, in key order.
    pub async fn get_batch(&self, collection_name: &str, keys: &[String]) -> Result<Vec<MemoryRecord>> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let documents = self
                .backend
                .find(collection_name, doc! { ID_FIELD: key.as_str() })
                .await?;
            for document in &documents {
                records.push(document_to_record(document, &self.config.embedding_key)?);
            }
        }
        debug!(
            parent: &self.span,
            collection_name = %collection_name,
            requested = keys.len(),
            count = records.len(),
            "MongoDB memory store get_batch returned"
        );
        Ok(records)
    }

    /// Deletes the record with `key`, if any.
    pub async fn remove(&self, collection_name: &str, key: &str) -> Result<()> {
        let deleted = self
            .backend
            .delete_one(collection_name, doc! { ID_FIELD: key })
            .await?;
        debug!(parent: &self.span, collection_name = %collection_name, key = %key, deleted, "Removed record");
        Ok(())
    }

    /// Deletes each key independently; there is no atomicity across the batch.
    pub async fn remove_batch(&self, collection_name: &str, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove(collection_name, key).await?;
        }
        Ok(())
    }

    pub async fn get_nearest_match(&self, collection_name: &str, embedding: &[f32]) -> Result<Option<MemoryRecord>> {
        let matches = self.get_nearest_matches(collection_name, embedding, 1).await?;
        Ok(matches.into_iter().next())
    }

    /// Returns up to `limit` records nearest to `embedding`, in server order.
    ///
    /// On Atlas, `numCandidates` is capped at [`ATLAS_MAX_NUM_CANDIDATES`](crate::ATLAS_MAX_NUM_CANDIDATES), so
    /// limits above that value are refused by the server.
    pub async fn get_nearest_matches(
        &self,
        collection_name: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        self.check_dimension(embedding.len())?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        info!(
            parent: &self.span,
            collection_name = %collection_name,
            limit,
            "Querying MongoDB memory store nearest matches"
        );
        let pipeline = self.dialect.similarity_pipeline(&VectorQuery {
            embedding,
            embedding_key: &self.config.embedding_key,
            index_name: &self.config.index_name,
            limit,
        });
        let documents = self.backend.aggregate(collection_name, pipeline).await?;

        let mut records = documents
            .iter()
            .map(|d| document_to_record(d, &self.config.embedding_key))
            .collect::<Result<Vec<_>>>()?;
        records.truncate(limit);

        info!(
            parent: &self.span,
            limit,
            count = records.len(),
            "MongoDB memory store nearest matches returned"
        );
        Ok(records)
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.config.vector_size {
            return Err(MongoStoreError::DimensionMismatch {
                expected: self.config.vector_size,
                actual,
            });
        }
        Ok(())
    }
}

fn bson_id_to_string(id: Bson) -> String {
    match id {
        Bson::String(s) => s,
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

#[async_trait]
impl MemoryStore for MongoMemoryStore {
    async fn create_collection(&self, collection_name: &str) -> anyhow::Result<()> {
        Ok(self
            .create_collection_with(collection_name, SimilarityMetric::Cosine, DEFAULT_NUM_LISTS)
            .await?)
    }

    async fn get_collections(&self) -> anyhow::Result<Vec<String>> {
        Ok(MongoMemoryStore::get_collections(self).await?)
    }

    async fn delete_collection(&self, collection_name: &str) -> anyhow::Result<()> {
        Ok(MongoMemoryStore::delete_collection(self, collection_name).await?)
    }

    async fn does_collection_exist(&self, collection_name: &str) -> anyhow::Result<bool> {
        Ok(MongoMemoryStore::does_collection_exist(self, collection_name).await?)
    }

    async fn upsert(&self, collection_name: &str, record: MemoryRecord) -> anyhow::Result<Option<String>> {
        Ok(MongoMemoryStore::upsert(self, collection_name, record).await?)
    }

    async fn upsert_batch(&self, collection_name: &str, records: Vec<MemoryRecord>) -> anyhow::Result<Vec<String>> {
        Ok(MongoMemoryStore::upsert_batch(self, collection_name, records).await?)
    }

    async fn get(&self, collection_name: &str, key: &str) -> anyhow::Result<Option<MemoryRecord>> {
        Ok(MongoMemoryStore::get(self, collection_name, key).await?)
    }

    async fn get_batch(&self, collection_name: &str, keys: &[String]) -> anyhow::Result<Vec<MemoryRecord>> {
        Ok(MongoMemoryStore::get_batch(self, collection_name, keys).await?)
    }

    async fn remove(&self, collection_name: &str, key: &str) -> anyhow::Result<()> {
        Ok(MongoMemoryStore::remove(self, collection_name, key).await?)
    }

    async fn remove_batch(&self, collection_name: &str, keys: &[String]) -> anyhow::Result<()> {
        Ok(MongoMemoryStore::remove_batch(self, collection_name, keys).await?)
    }

    async fn get_nearest_matches(
        &self,
        collection_name: &str,
        embedding: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<MemoryRecord>> {
        Ok(MongoMemoryStore::get_nearest_matches(self, collection_name, embedding, limit).await?)
    }

    async fn get_nearest_match(
        &self,
        collection_name: &str,
        embedding: &[f32],
    ) -> anyhow::Result<Option<MemoryRecord>> {
        Ok(MongoMemoryStore::get_nearest_match(self, collection_name, embedding).await?)
    }

    async fn close(&self) -> anyhow::Result<()> {
        MongoMemoryStore::close(self).await;
        Ok(())
    }
}
