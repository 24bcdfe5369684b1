//! Generic typed repository over a document collection.
//!
//! Entities are stored in their JSON form with the identifier written to the
//! `id` field as a string. Any `Serialize + DeserializeOwned` type with a
//! [`Uuid`] identifier can be persisted without a per-type mapping.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{CommonError, CommonResult};
use crate::filter::Filter;
use crate::store::{Document, DocumentCollection, DocumentDatabase, ID_FIELD};

/// A storable record with a unique identifier.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique identifier of this entity.
    fn id(&self) -> Uuid;
}

/// Typed CRUD and query operations over one collection.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Every entity, in store order.
    async fn get_all(&self) -> CommonResult<Vec<T>>;

    /// Every entity matching the filter, in store order.
    async fn get_all_matching(&self, filter: &Filter) -> CommonResult<Vec<T>>;

    /// The entity with the given identifier, if any.
    async fn get_by_id(&self, id: Uuid) -> CommonResult<Option<T>>;

    /// The first entity matching the filter, if any.
    async fn find_one(&self, filter: &Filter) -> CommonResult<Option<T>>;

    /// Persist a new entity.
    async fn insert(&self, entity: &T) -> CommonResult<()>;

    /// Replace the stored entity with the same identifier. No-op if none
    /// exists.
    async fn update(&self, entity: &T) -> CommonResult<()>;

    /// Remove the entity with the given identifier. No-op if none exists.
    async fn delete(&self, id: Uuid) -> CommonResult<()>;
}

/// [`Repository`] backed by a [`DocumentCollection`].
pub struct DocumentRepository<T> {
    collection: Arc<dyn DocumentCollection>,
    collection_name: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> DocumentRepository<T> {
    /// Bind a repository to a named collection of the database.
    pub fn new(database: &dyn DocumentDatabase, collection_name: impl Into<String>) -> Self {
        let collection_name = collection_name.into();
        Self {
            collection: database.collection(&collection_name),
            collection_name,
            _entity: PhantomData,
        }
    }

    /// Name of the backing collection.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn decode_all(documents: Vec<Document>) -> CommonResult<Vec<T>> {
        documents.into_iter().map(from_document).collect()
    }
}

fn id_filter(id: Uuid) -> Filter {
    Filter::eq(ID_FIELD, id.to_string())
}

/// Serialize an entity into its stored form.
///
/// # Errors
///
/// Returns `InvalidArgument` if the entity does not serialize to a record.
pub fn to_document<T: Entity>(entity: &T) -> CommonResult<Document> {
    let value = serde_json::to_value(entity)
        .map_err(|e| CommonError::invalid_argument(format!("entity is not serializable: {e}")))?;
    let Value::Object(mut document) = value else {
        return Err(CommonError::invalid_argument("entity must serialize to a record"));
    };
    document.insert(ID_FIELD.to_string(), Value::String(entity.id().to_string()));
    Ok(document)
}

/// Deserialize a stored document back into an entity.
///
/// # Errors
///
/// Returns `Store` if the document does not match the entity's shape.
pub fn from_document<T: Entity>(document: Document) -> CommonResult<T> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| CommonError::store(format!("corrupt document: {e}")))
}

#[async_trait]
impl<T: Entity> Repository<T> for DocumentRepository<T> {
    #[instrument(skip(self), fields(collection = %self.collection_name))]
    async fn get_all(&self) -> CommonResult<Vec<T>> {
        let documents = self.collection.find(&Filter::all()).await?;
        debug!(count = documents.len(), "Loaded documents");
        Self::decode_all(documents)
    }

    #[instrument(skip(self, filter), fields(collection = %self.collection_name))]
    async fn get_all_matching(&self, filter: &Filter) -> CommonResult<Vec<T>> {
        let documents = self.collection.find(filter).await?;
        debug!(count = documents.len(), "Loaded matching documents");
        Self::decode_all(documents)
    }

    #[instrument(skip(self), fields(collection = %self.collection_name))]
    async fn get_by_id(&self, id: Uuid) -> CommonResult<Option<T>> {
        self.collection
            .find_one(&id_filter(id))
            .await?
            .map(from_document)
            .transpose()
    }

    #[instrument(skip(self, filter), fields(collection = %self.collection_name))]
    async fn find_one(&self, filter: &Filter) -> CommonResult<Option<T>> {
        self.collection.find_one(filter).await?.map(from_document).transpose()
    }

    #[instrument(skip(self, entity), fields(collection = %self.collection_name, id = %entity.id()))]
    async fn insert(&self, entity: &T) -> CommonResult<()> {
        let document = to_document(entity)?;
        self.collection.insert_one(document).await?;
        debug!("Inserted document");
        Ok(())
    }

    #[instrument(skip(self, entity), fields(collection = %self.collection_name, id = %entity.id()))]
    async fn update(&self, entity: &T) -> CommonResult<()> {
        let document = to_document(entity)?;
        let replaced = self.collection.replace_one(&id_filter(entity.id()), document).await?;
        debug!(replaced, "Replaced document");
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.collection_name))]
    async fn delete(&self, id: Uuid) -> CommonResult<()> {
        let deleted = self.collection.delete_one(&id_filter(id)).await?;
        debug!(deleted, "Deleted document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDatabase;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: Uuid,
        customer: String,
        total: f64,
    }

    impl Entity for Order {
        fn id(&self) -> Uuid {
            self.id
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Tag(String);

    impl Entity for Tag {
        fn id(&self) -> Uuid {
            Uuid::nil()
        }
    }

    fn order(customer: &str, total: f64) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer: customer.to_string(),
            total,
        }
    }

    fn repo() -> DocumentRepository<Order> {
        DocumentRepository::new(&InMemoryDatabase::new("orders-service"), "orders")
    }

    #[test]
    fn test_to_document_writes_string_id() {
        let o = order("ada", 10.0);
        let document = to_document(&o).unwrap();
        assert_eq!(document[ID_FIELD], Value::String(o.id.to_string()));
        assert_eq!(document["customer"], "ada");
    }

    #[test]
    fn test_to_document_rejects_non_record() {
        let result = to_document(&Tag("x".to_string()));
        assert!(matches!(result, Err(CommonError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_insert_then_get_by_id() {
        let repo = repo();
        let o = order("ada", 10.0);
        repo.insert(&o).await.unwrap();

        assert_eq!(repo.get_by_id(o.id).await.unwrap(), Some(o));
        assert_eq!(repo.get_by_id(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = repo();
        let mut o = order("ada", 10.0);
        repo.insert(&o).await.unwrap();

        o.total = 25.0;
        repo.update(&o).await.unwrap();
        assert_eq!(repo.get_by_id(o.id).await.unwrap().unwrap().total, 25.0);

        repo.delete(o.id).await.unwrap();
        assert_eq!(repo.get_by_id(o.id).await.unwrap(), None);

        // Both are no-ops once the entity is gone.
        repo.update(&o).await.unwrap();
        repo.delete(o.id).await.unwrap();
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let repo = repo();
        let o = order("ada", 10.0);
        repo.insert(&o).await.unwrap();
        assert!(matches!(repo.insert(&o).await, Err(CommonError::Store(_))));
    }

    #[tokio::test]
    async fn test_filtering() {
        let repo = repo();
        let small = order("ada", 5.0);
        let large = order("grace", 500.0);
        let medium = order("ada", 50.0);
        for o in [&small, &large, &medium] {
            repo.insert(o).await.unwrap();
        }

        let ada = repo.get_all_matching(&Filter::eq("customer", "ada")).await.unwrap();
        assert_eq!(ada, vec![small.clone(), medium.clone()]);

        let first_big = repo.find_one(&Filter::gt("total", 10)).await.unwrap();
        assert_eq!(first_big, Some(large));

        assert_eq!(repo.get_all_matching(&Filter::all()).await.unwrap().len(), 3);
        assert!(repo.get_all_matching(&Filter::none()).await.unwrap().is_empty());
        assert_eq!(repo.collection_name(), "orders");
    }
}
