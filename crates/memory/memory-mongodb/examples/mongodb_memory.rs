//! Stores a few records in MongoDB / Cosmos DB and runs a nearest-match query.
//!
//! Reads its configuration from the environment (or a `.env` file):
//! `MONGODB_CONNECTION_STRING`, `MONGODB_DATABASE`, `MONGODB_COLLECTION`,
//! `MONGODB_VECTOR_SIZE=3`, optionally `MONGODB_API_TYPE=mongodbatlas`.
//!
//! Run with: `cargo run -p memory-mongodb --example mongodb_memory`

use memory_core::MemoryRecord;
use memory_mongodb::{MongoMemoryStore, MongoStoreConfig, MongoStoreError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).init();

    let config = MongoStoreConfig::from_env()?;
    let collection = config.collection_name.clone();

    let store = match MongoMemoryStore::connect(config).await {
        Ok(store) => store,
        Err(MongoStoreError::MissingIndex { collection, index }) => {
            warn!(
                collection = %collection,
                index = %index,
                "Create the vector search index before running this example"
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let ids = store
        .upsert_batch(
            &collection,
            vec![
                MemoryRecord::local_record("cat", "Cats purr", None, None, vec![1.0, 0.0, 0.0]),
                MemoryRecord::local_record("dog", "Dogs bark", None, None, vec![0.0, 1.0, 0.0]),
            ],
        )
        .await?;
    info!(inserted = ?ids, "Upserted example records");

    let nearest = store.get_nearest_match(&collection, &[0.9, 0.1, 0.0]).await?;
    info!(
        id = ?nearest.as_ref().and_then(|r| r.id.clone()),
        text = ?nearest.as_ref().and_then(|r| r.text.clone()),
        "Nearest match"
    );

    let keys = vec!["cat".to_string(), "dog".to_string()];
    store.remove_batch(&collection, &keys).await?;
    store.close().await;
    Ok(())
}
