//! Document store abstraction and the bundled in-memory store.
//!
//! A [`DocumentDatabase`] hands out named [`DocumentCollection`]s. Documents
//! are JSON records; every collection keeps a unique index on the `id` field.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CommonError, CommonResult};
use crate::filter::Filter;

/// A stored record.
pub type Document = Map<String, Value>;

/// Field holding the unique document identifier.
pub const ID_FIELD: &str = "id";

/// Operations a repository needs from one collection.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// All documents matching the filter, in store order.
    async fn find(&self, filter: &Filter) -> CommonResult<Vec<Document>>;

    /// First document matching the filter, in store order.
    async fn find_one(&self, filter: &Filter) -> CommonResult<Option<Document>>;

    /// Insert a new document.
    async fn insert_one(&self, document: Document) -> CommonResult<()>;

    /// Replace the first document matching the filter. Returns the number of
    /// documents replaced.
    async fn replace_one(&self, filter: &Filter, document: Document) -> CommonResult<u64>;

    /// Delete the first document matching the filter. Returns the number of
    /// documents deleted.
    async fn delete_one(&self, filter: &Filter) -> CommonResult<u64>;
}

/// A handle to a database of named collections.
pub trait DocumentDatabase: Send + Sync {
    /// Database name.
    fn name(&self) -> &str;

    /// Get a collection, creating it on first use.
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;
}

/// In-process document database.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    name: String,
    collections: Mutex<HashMap<String, Arc<InMemoryCollection>>>,
}

impl InMemoryDatabase {
    /// Create an empty database.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: Mutex::new(HashMap::new()),
        }
    }

    /// Names of the collections created so far.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }
}

impl DocumentDatabase for InMemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        let mut collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        let collection = collections.entry(name.to_string()).or_insert_with(|| {
            debug!(database = %self.name, collection = name, "Creating collection");
            Arc::new(InMemoryCollection::default())
        });
        Arc::clone(collection) as Arc<dyn DocumentCollection>
    }
}

/// In-process collection preserving insertion order.
#[derive(Debug, Default)]
pub struct InMemoryCollection {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryCollection {
    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the collection is empty.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn duplicate_key(id: &Value) -> CommonError {
    CommonError::store(format!("duplicate key: {ID_FIELD} {id}"))
}

fn same_id(doc: &Document, id: Option<&Value>) -> bool {
    id.is_some() && doc.get(ID_FIELD) == id
}

#[async_trait]
impl DocumentCollection for InMemoryCollection {
    async fn find(&self, filter: &Filter) -> CommonResult<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    async fn find_one(&self, filter: &Filter) -> CommonResult<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|d| filter.matches(d)).cloned())
    }

    async fn insert_one(&self, document: Document) -> CommonResult<()> {
        let mut documents = self.documents.write().await;
        let id = document.get(ID_FIELD);
        if let Some(existing) = documents.iter().find(|d| same_id(d, id)) {
            return Err(duplicate_key(&existing[ID_FIELD]));
        }
        documents.push(document);
        Ok(())
    }

    async fn replace_one(&self, filter: &Filter, document: Document) -> CommonResult<u64> {
        let mut documents = self.documents.write().await;
        let Some(index) = documents.iter().position(|d| filter.matches(d)) else {
            return Ok(0);
        };

        let id = document.get(ID_FIELD);
        let collides = documents
            .iter()
            .enumerate()
            .any(|(i, d)| i != index && same_id(d, id));
        if collides {
            return Err(duplicate_key(id.unwrap_or(&Value::Null)));
        }

        documents[index] = document;
        Ok(1)
    }

    async fn delete_one(&self, filter: &Filter) -> CommonResult<u64> {
        let mut documents = self.documents.write().await;
        match documents.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
