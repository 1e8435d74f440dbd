//! Shared test utilities for memory-mongodb integration tests.
//!
//! Provides FakeBackend, an in-memory MongoBackend that records every call and
//! answers both vector search pipelines with brute-force cosine ranking.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use memory_mongodb::{MongoBackend, MongoStoreError, Result};
use mongodb::bson::{oid::ObjectId, Bson, Document};

/// In-memory MongoBackend for tests.
#[derive(Default)]
pub struct FakeBackend {
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
    indexes: Mutex<HashMap<String, Vec<String>>>,
    search_indexes: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<String>>,
    shutdowns: AtomicUsize,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection.
    pub fn with_collection(self, collection: &str) -> Self {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default();
        self
    }

    /// Adds a collection carrying a regular (Cosmos) index.
    pub fn with_index(self, collection: &str, index: &str) -> Self {
        let this = self.with_collection(collection);
        this.indexes
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(index.to_string());
        this
    }

    /// Adds a collection carrying an Atlas Search index.
    pub fn with_search_index(self, collection: &str, index: &str) -> Self {
        let this = self.with_collection(collection);
        this.search_indexes
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(index.to_string());
        this
    }

    /// Names of the backend methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| document.get(key) == Some(value))
}

fn to_vector(value: Option<&Bson>) -> Vec<f32> {
    match value {
        Some(Bson::Array(values)) => values
            .iter()
            .map(|v| match v {
                Bson::Double(d) => *d as f32,
                Bson::Int32(i) => *i as f32,
                Bson::Int64(i) => *i as f32,
                _ => 0.0,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn as_usize(value: Option<&Bson>) -> usize {
    match value {
        Some(Bson::Int32(v)) => *v as usize,
        Some(Bson::Int64(v)) => *v as usize,
        _ => 0,
    }
}

#[async_trait]
impl MongoBackend for FakeBackend {
    async fn list_collection_names(&self) -> Result<Vec<String>> {
        self.record("list_collection_names");
        Ok(self.collections.lock().unwrap().keys().cloned().collect())
    }

    async fn create_collection(&self, collection_name: &str) -> Result<()> {
        self.record("create_collection");
        self.collections
            .lock()
            .unwrap()
            .entry(collection_name.to_string())
            .or_default();
        Ok(())
    }

    async fn drop_collection(&self, collection_name: &str) -> Result<()> {
        self.record("drop_collection");
        self.collections.lock().unwrap().remove(collection_name);
        self.indexes.lock().unwrap().remove(collection_name);
        self.search_indexes.lock().unwrap().remove(collection_name);
        Ok(())
    }

    async fn run_command(&self, command: Document) -> Result<Document> {
        self.record("run_command");
        let collection = command
            .get_str("createIndexes")
            .map_err(|_| MongoStoreError::MalformedDocument("unsupported command".to_string()))?
            .to_string();
        self.collections
            .lock()
            .unwrap()
            .entry(collection.clone())
            .or_default();
        let names: Vec<String> = command
            .get_array("indexes")
            .map(|indexes| {
                indexes
                    .iter()
                    .filter_map(|i| i.as_document())
                    .filter_map(|i| i.get_str("name").ok().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        self.indexes
            .lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .extend(names);
        let mut reply = Document::new();
        reply.insert("ok", 1.0);
        Ok(reply)
    }

    async fn list_index_names(&self, collection_name: &str) -> Result<Vec<String>> {
        self.record("list_index_names");
        if !self.collections.lock().unwrap().contains_key(collection_name) {
            return Ok(Vec::new());
        }
        let mut names = vec!["_id_".to_string()];
        if let Some(extra) = self.indexes.lock().unwrap().get(collection_name) {
            names.extend(extra.iter().cloned());
        }
        Ok(names)
    }

    async fn list_search_index_names(&self, collection_name: &str) -> Result<Vec<String>> {
        self.record("list_search_index_names");
        Ok(self
            .search_indexes
            .lock()
            .unwrap()
            .get(collection_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn find(&self, collection_name: &str, filter: Document) -> Result<Vec<Document>> {
        self.record("find");
        Ok(self
            .documents(collection_name)
            .into_iter()
            .filter(|d| matches_filter(d, &filter))
            .collect())
    }

    async fn find_one(&self, collection_name: &str, filter: Document) -> Result<Option<Document>> {
        self.record("find_one");
        Ok(self
            .documents(collection_name)
            .into_iter()
            .find(|d| matches_filter(d, &filter)))
    }

    async fn insert_many(&self, collection_name: &str, documents: Vec<Document>) -> Result<Vec<Bson>> {
        self.record("insert_many");
        let mut collections = self.collections.lock().unwrap();
        let stored = collections.entry(collection_name.to_string()).or_default();
        let mut ids = Vec::with_capacity(documents.len());
        for mut document in documents {
            if !document.contains_key("_id") {
                document.insert("_id", ObjectId::new());
            }
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);
            if stored.iter().any(|d| d.get("_id") == Some(&id)) {
                return Err(MongoStoreError::MalformedDocument(format!("duplicate key {}", id)));
            }
            stored.push(document);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn update_one(&self, collection_name: &str, filter: Document, update: Document) -> Result<u64> {
        self.record("update_one");
        let fields = update
            .get_document("$set")
            .map_err(|_| MongoStoreError::MalformedDocument("update without $set".to_string()))?
            .clone();
        let mut collections = self.collections.lock().unwrap();
        let Some(stored) = collections.get_mut(collection_name) else {
            return Ok(0);
        };
        let Some(document) = stored.iter_mut().find(|d| matches_filter(d, &filter)) else {
            return Ok(0);
        };
        let before = document.clone();
        for (key, value) in fields {
            document.insert(key, value);
        }
        Ok(if *document == before { 0 } else { 1 })
    }

    async fn delete_one(&self, collection_name: &str, filter: Document) -> Result<u64> {
        self.record("delete_one");
        let mut collections = self.collections.lock().unwrap();
        let Some(stored) = collections.get_mut(collection_name) else {
            return Ok(0);
        };
        match stored.iter().position(|d| matches_filter(d, &filter)) {
            Some(position) => {
                stored.remove(position);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn aggregate(&self, collection_name: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.record("aggregate");
        let stage = pipeline
            .first()
            .ok_or_else(|| MongoStoreError::MalformedDocument("empty pipeline".to_string()))?;

        let (query, path, limit) = if let Ok(search) = stage.get_document("$search") {
            let cosmos = search
                .get_document("cosmosSearch")
                .map_err(|_| MongoStoreError::MalformedDocument("no cosmosSearch".to_string()))?;
            (
                to_vector(cosmos.get("vector")),
                cosmos.get_str("path").unwrap_or_default().to_string(),
                as_usize(cosmos.get("k")),
            )
        } else if let Ok(search) = stage.get_document("$vectorSearch") {
            let index = search.get_str("index").unwrap_or_default();
            let indexed = self
                .search_indexes
                .lock()
                .unwrap()
                .get(collection_name)
                .map(|names| names.iter().any(|n| n == index))
                .unwrap_or(false);
            if !indexed {
                return Ok(Vec::new());
            }
            (
                to_vector(search.get("queryVector")),
                search.get_str("path").unwrap_or_default().to_string(),
                as_usize(search.get("limit")),
            )
        } else {
            return Err(MongoStoreError::MalformedDocument("unsupported stage".to_string()));
        };

        let mut scored: Vec<(f32, Document)> = self
            .documents(collection_name)
            .into_iter()
            .map(|d| (cosine_similarity(&to_vector(d.get(&path)), &query), d))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, d)| d).collect())
    }

    async fn shutdown(&self) {
        self.record("shutdown");
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
