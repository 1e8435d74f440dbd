//! Shared test utilities for memory-core integration tests.
//!
//! Provides MockStore, a MemoryStore that keeps records in a map and counts
//! calls so tests can check what the trait's provided methods delegate to.

use async_trait::async_trait;
use memory_core::{MemoryRecord, MemoryStore};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store implementing MemoryStore for tests.
/// Ids are assigned from a counter; "nearest" means smallest squared distance.
#[derive(Default)]
pub struct MockStore {
    records: Arc<RwLock<BTreeMap<String, MemoryRecord>>>,
    next_id: AtomicUsize,
    pub upsert_batch_calls: AtomicUsize,
    pub nearest_calls: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[async_trait]
impl MemoryStore for MockStore {
    async fn create_collection(&self, _collection_name: &str) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn get_collections(&self) -> Result<Vec<String>, anyhow::Error> {
        Ok(vec!["default".to_string()])
    }

    async fn delete_collection(&self, _collection_name: &str) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn does_collection_exist(&self, collection_name: &str) -> Result<bool, anyhow::Error> {
        Ok(collection_name == "default")
    }

    async fn upsert_batch(
        &self,
        _collection_name: &str,
        records: Vec<MemoryRecord>,
    ) -> Result<Vec<String>, anyhow::Error> {
        self.upsert_batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.records.write().await;
        let mut inserted = Vec::new();
        for mut record in records {
            let id = match &record.id {
                Some(id) => id.clone(),
                None => format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            };
            record.id = Some(id.clone());
            if entries.insert(id.clone(), record).is_none() {
                inserted.push(id);
            }
        }
        Ok(inserted)
    }

    async fn get(
        &self,
        _collection_name: &str,
        key: &str,
    ) -> Result<Option<MemoryRecord>, anyhow::Error> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn get_batch(
        &self,
        _collection_name: &str,
        keys: &[String],
    ) -> Result<Vec<MemoryRecord>, anyhow::Error> {
        let entries = self.records.read().await;
        Ok(keys.iter().filter_map(|k| entries.get(k).cloned()).collect())
    }

    async fn remove(&self, _collection_name: &str, key: &str) -> Result<(), anyhow::Error> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn remove_batch(
        &self,
        _collection_name: &str,
        keys: &[String],
    ) -> Result<(), anyhow::Error> {
        let mut entries = self.records.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn get_nearest_matches(
        &self,
        _collection_name: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, anyhow::Error> {
        self.nearest_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.records.read().await;
        let mut scored: Vec<(f32, MemoryRecord)> = entries
            .values()
            .map(|r| (squared_distance(&r.embedding, embedding), r.clone()))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored.into_iter().take(limit).map(|(_, r)| r).collect())
    }
}
