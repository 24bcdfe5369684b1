//! MongoDB-backed document store.
//!
//! [`Filter`] trees are translated to query documents, so matching runs in
//! the server. Reads come back sorted by `_id` (insertion order for
//! driver-generated ids) with `_id` stripped, which keeps stored records
//! identical to what the in-memory store returns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{self, Bson, Document as BsonDocument, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{CommonError, CommonResult};
use crate::filter::Filter;
use crate::store::{Document, DocumentCollection, DocumentDatabase, ID_FIELD};

const MONGO_ID: &str = "_id";
const DUPLICATE_KEY: i32 = 11000;

/// A database on a MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoDatabase {
    name: String,
    database: Database,
}

impl MongoDatabase {
    /// Connect and check the deployment answers a `ping`.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::Store`] if the connection string is invalid or
    /// no server is selectable within `server_selection_timeout`.
    pub async fn connect(
        connection_string: &str,
        database_name: &str,
        server_selection_timeout: Duration,
    ) -> CommonResult<Self> {
        let mut options = ClientOptions::parse(connection_string).await.map_err(store_error)?;
        options.server_selection_timeout = Some(server_selection_timeout);
        options.app_name = Some(database_name.to_string());

        let client = Client::with_options(options).map_err(store_error)?;
        let database = client.database(database_name);
        database.run_command(doc! { "ping": 1 }).await.map_err(store_error)?;

        info!(database = database_name, "Connected to MongoDB");
        Ok(Self {
            name: database_name.to_string(),
            database,
        })
    }
}

impl DocumentDatabase for MongoDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(MongoCollection {
            inner: self.database.collection(name),
            id_index: OnceCell::new(),
        })
    }
}

struct MongoCollection {
    inner: Collection<BsonDocument>,
    id_index: OnceCell<()>,
}

impl MongoCollection {
    async fn ensure_id_index(&self) -> CommonResult<()> {
        self.id_index
            .get_or_try_init(|| async {
                let mut keys = BsonDocument::new();
                keys.insert(ID_FIELD, 1);
                let index = IndexModel::builder()
                    .keys(keys)
                    .options(IndexOptions::builder().unique(true).build())
                    .build();
                self.inner.create_index(index).await.map_err(store_error)?;
                debug!(collection = self.inner.name(), "Ensured unique id index");
                Ok::<_, CommonError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    async fn find(&self, filter: &Filter) -> CommonResult<Vec<Document>> {
        let mut cursor = self
            .inner
            .find(to_query(filter)?)
            .sort(doc! { "_id": 1 })
            .await
            .map_err(store_error)?;

        let mut documents = Vec::new();
        while cursor.advance().await.map_err(store_error)? {
            let raw: BsonDocument = cursor.deserialize_current().map_err(store_error)?;
            documents.push(from_bson(raw)?);
        }
        Ok(documents)
    }

    async fn find_one(&self, filter: &Filter) -> CommonResult<Option<Document>> {
        self.inner
            .find_one(to_query(filter)?)
            .sort(doc! { "_id": 1 })
            .await
            .map_err(store_error)?
            .map(from_bson)
            .transpose()
    }

    async fn insert_one(&self, document: Document) -> CommonResult<()> {
        self.ensure_id_index().await?;
        self.inner
            .insert_one(to_bson(&document)?)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    CommonError::store(format!("duplicate {ID_FIELD} in {}", self.inner.name()))
                } else {
                    store_error(e)
                }
            })?;
        Ok(())
    }

    async fn replace_one(&self, filter: &Filter, document: Document) -> CommonResult<u64> {
        let result = self
            .inner
            .replace_one(to_query(filter)?, to_bson(&document)?)
            .await
            .map_err(store_error)?;
        Ok(result.matched_count)
    }

    async fn delete_one(&self, filter: &Filter) -> CommonResult<u64> {
        let result = self.inner.delete_one(to_query(filter)?).await.map_err(store_error)?;
        Ok(result.deleted_count)
    }
}

fn store_error(error: MongoError) -> CommonError {
    CommonError::store(error.to_string())
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

fn to_bson(document: &Document) -> CommonResult<BsonDocument> {
    bson::to_document(document).map_err(|e| CommonError::store(format!("unsupported document: {e}")))
}

fn to_bson_value(value: &Value) -> CommonResult<Bson> {
    bson::to_bson(value).map_err(|e| CommonError::store(format!("unsupported filter value: {e}")))
}

fn from_bson(mut raw: BsonDocument) -> CommonResult<Document> {
    raw.remove(MONGO_ID);
    match Bson::Document(raw).into_relaxed_extjson() {
        Value::Object(document) => Ok(document),
        other => Err(CommonError::store(format!("stored record is not an object: {other}"))),
    }
}

/// Translate a filter into a MongoDB query document.
///
/// # Errors
///
/// Returns [`CommonError::Store`] if a value has no BSON representation.
pub fn to_query(filter: &Filter) -> CommonResult<BsonDocument> {
    let query = match filter {
        Filter::All => BsonDocument::new(),
        Filter::Eq { field, value } => field_query(field, "$eq", to_bson_value(value)?),
        Filter::Ne { field, value } => field_query(field, "$ne", to_bson_value(value)?),
        Filter::Gt { field, value } => field_query(field, "$gt", to_bson_value(value)?),
        Filter::Gte { field, value } => field_query(field, "$gte", to_bson_value(value)?),
        Filter::Lt { field, value } => field_query(field, "$lt", to_bson_value(value)?),
        Filter::Lte { field, value } => field_query(field, "$lte", to_bson_value(value)?),
        Filter::In { field, values } => {
            let values = values.iter().map(to_bson_value).collect::<CommonResult<Vec<_>>>()?;
            field_query(field, "$in", Bson::Array(values))
        }
        Filter::Contains { field, substring } => field_query(field, "$regex", Bson::String(escape_regex(substring))),
        Filter::Exists { field } => field_query(field, "$exists", Bson::Boolean(true)),
        Filter::And { filters } if filters.is_empty() => BsonDocument::new(),
        Filter::And { filters } => combine("$and", filters)?,
        // `$or` rejects an empty array; an empty disjunction matches nothing.
        Filter::Or { filters } if filters.is_empty() => combine("$nor", &[Filter::All])?,
        Filter::Or { filters } => combine("$or", filters)?,
        Filter::Not { filter } => combine("$nor", std::slice::from_ref(filter.as_ref()))?,
    };
    Ok(query)
}

fn field_query(field: &str, operator: &str, operand: Bson) -> BsonDocument {
    let mut condition = BsonDocument::new();
    condition.insert(operator, operand);
    let mut query = BsonDocument::new();
    query.insert(field, condition);
    query
}

fn combine(operator: &str, filters: &[Filter]) -> CommonResult<BsonDocument> {
    let clauses = filters
        .iter()
        .map(|f| to_query(f).map(Bson::Document))
        .collect::<CommonResult<Vec<_>>>()?;
    let mut query = BsonDocument::new();
    query.insert(operator, clauses);
    Ok(query)
}

fn escape_regex(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
