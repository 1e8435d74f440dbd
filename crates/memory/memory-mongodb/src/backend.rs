//! Database handle used by MongoMemoryStore.
//!
//! [`MongoBackend`] is the slice of the MongoDB API the store needs.
//! [`DriverBackend`] implements it with the official `mongodb` driver; tests
//! substitute an in-memory implementation.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;

/// Server error code for a namespace (collection) that does not exist.
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Operations the store issues against a database.
///
/// Every method is a single request/response round trip; implementations do not retry.
#[async_trait]
pub trait MongoBackend: Send + Sync {
    async fn list_collection_names(&self) -> Result<Vec<String>>;

    async fn create_collection(&self, collection_name: &str) -> Result<()>;

    /// Drops a collection. A missing collection is not an error.
    async fn drop_collection(&self, collection_name: &str) -> Result<()>;

    async fn run_command(&self, command: Document) -> Result<Document>;

    /// Names of the regular indexes on a collection; empty for a missing collection.
    async fn list_index_names(&self, collection_name: &str) -> Result<Vec<String>>;

    /// Names of the Atlas Search indexes on a collection; empty for a missing collection.
    async fn list_search_index_names(&self, collection_name: &str) -> Result<Vec<String>>;

    async fn find(&self, collection_name: &str, filter: Document) -> Result<Vec<Document>>;

    async fn find_one(&self, collection_name: &str, filter: Document) -> Result<Option<Document>>;

    /// Inserts documents and returns their ids in insertion order.
    async fn insert_many(&self, collection_name: &str, documents: Vec<Document>) -> Result<Vec<Bson>>;

    /// Applies `update` to the first match and returns the modified count.
    async fn update_one(&self, collection_name: &str, filter: Document, update: Document) -> Result<u64>;

    /// Deletes the first match and returns the deleted count.
    async fn delete_one(&self, collection_name: &str, filter: Document) -> Result<u64>;

    async fn aggregate(&self, collection_name: &str, pipeline: Vec<Document>) -> Result<Vec<Document>>;

    /// Releases the connection. Calling it again is a no-op.
    async fn shutdown(&self);
}

/// MongoBackend over the official `mongodb` driver.
pub struct DriverBackend {
    client: Mutex<Option<Client>>,
    database: Database,
}

impl DriverBackend {
    /// Parses the connection string and opens a client for `database_name`.
    ///
    /// The driver connects lazily; the first operation performs the handshake.
    pub async fn connect(connection_string: &str, database_name: &str) -> Result<Self> {
        let mut client_options = ClientOptions::parse(connection_string).await?;
        client_options.app_name = Some("memory-mongodb".to_string());

        let client = Client::with_options(client_options)?;
        let database = client.database(database_name);
        info!(database = %database_name, "MongoDB client created");

        Ok(Self::from_client(client, database))
    }

    /// Wraps an existing client and database handle.
    pub fn from_client(client: Client, database: Database) -> Self {
        Self {
            client: Mutex::new(Some(client)),
            database,
        }
    }

    fn collection(&self, collection_name: &str) -> Collection<Document> {
        self.database.collection::<Document>(collection_name)
    }
}

fn is_namespace_not_found(error: &mongodb::error::Error) -> bool {
    matches!(error.kind.as_ref(), ErrorKind::Command(command_error) if command_error.code == NAMESPACE_NOT_FOUND)
}

#[async_trait]
impl MongoBackend for DriverBackend {
    async fn list_collection_names(&self) -> Result<Vec<String>> {
        Ok(self.database.list_collection_names().await?)
    }

    async fn create_collection(&self, collection_name: &str) -> Result<()> {
        self.database.create_collection(collection_name).await?;
        Ok(())
    }

    async fn drop_collection(&self, collection_name: &str) -> Result<()> {
        self.collection(collection_name).drop().await?;
        Ok(())
    }

    async fn run_command(&self, command: Document) -> Result<Document> {
        Ok(self.database.run_command(command).await?)
    }

    async fn list_index_names(&self, collection_name: &str) -> Result<Vec<String>> {
        match self.collection(collection_name).list_index_names().await {
            Ok(names) => Ok(names),
            Err(e) if is_namespace_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_search_index_names(&self, collection_name: &str) -> Result<Vec<String>> {
        let cursor = match self.collection(collection_name).list_search_indexes().await {
            Ok(cursor) => cursor,
            Err(e) if is_namespace_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let indexes: Vec<Document> = cursor.try_collect().await?;
        Ok(indexes
            .iter()
            .filter_map(|index| index.get_str("name").ok().map(str::to_string))
            .collect())
    }

    async fn find(&self, collection_name: &str, filter: Document) -> Result<Vec<Document>> {
        let cursor = self.collection(collection_name).find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(&self, collection_name: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.collection(collection_name).find_one(filter).await?)
    }

    async fn insert_many(&self, collection_name: &str, documents: Vec<Document>) -> Result<Vec<Bson>> {
        let result = self.collection(collection_name).insert_many(documents).await?;
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(position, _)| *position);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn update_one(&self, collection_name: &str, filter: Document, update: Document) -> Result<u64> {
        let result = self.collection(collection_name).update_one(filter, update).await?;
        Ok(result.modified_count)
    }

    async fn delete_one(&self, collection_name: &str, filter: Document) -> Result<u64> {
        let result = self.collection(collection_name).delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    async fn aggregate(&self, collection_name: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let cursor = self.collection(collection_name).aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn shutdown(&self) {
        let client = self.client.lock().await.take();
        match client {
            Some(client) => {
                client.shutdown().await;
                info!(database = %self.database.name(), "MongoDB client shut down");
            }
            None => debug!("MongoDB client already shut down"),
        }
    }
}
