//! Startup wiring for services.
//!
//! Helpers that turn loaded settings into shareable handles: a resilient
//! HTTP client, the service's document database (MongoDB, or in-memory for
//! tests), typed repositories, and message broker endpoint names.

use std::any::type_name;
use std::sync::Arc;

use tracing::info;

use crate::client::{ResiliencePolicy, ResilientClient};
use crate::error::CommonResult;
use crate::mongo::MongoDatabase;
use crate::repository::{DocumentRepository, Entity, Repository};
use crate::settings::{BrokerSettings, DocumentStoreSettings, HttpClientSettings, ServiceSettings};
use crate::store::{DocumentDatabase, InMemoryDatabase};

const ENDPOINT_SUFFIXES: [&str; 4] = ["Consumer", "StateMachine", "Saga", "Activity"];

/// Build a shareable resilient client with the default policy.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the HTTP client cannot be
/// built.
pub fn add_http_client(settings: &HttpClientSettings) -> CommonResult<Arc<ResilientClient>> {
    add_http_client_with_policy(settings, ResiliencePolicy::from_settings(settings))
}

/// Build a shareable resilient client with a custom policy.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the HTTP client cannot be
/// built.
pub fn add_http_client_with_policy(
    settings: &HttpClientSettings,
    policy: ResiliencePolicy,
) -> CommonResult<Arc<ResilientClient>> {
    let client = ResilientClient::from_settings_with_policy(settings, policy)?;
    info!(
        base_url = client.base_url(),
        timeout_secs = settings.timeout_seconds,
        headers = settings.headers.len(),
        "Registered HTTP client"
    );
    Ok(Arc::new(client))
}

/// Connect to the MongoDB database named after the service.
///
/// # Errors
///
/// Returns [`CommonError::Store`](crate::error::CommonError::Store) if the
/// store is unreachable within the configured timeout.
pub async fn add_document_store(
    service: &ServiceSettings,
    store: &DocumentStoreSettings,
) -> CommonResult<Arc<dyn DocumentDatabase>> {
    let database = MongoDatabase::connect(&store.connection_string(), &service.service_name, store.timeout()).await?;
    info!(
        database = %service.service_name,
        host = %store.host,
        port = store.port,
        "Registered document store"
    );
    Ok(Arc::new(database))
}

/// Open an in-process database named after the service, for tests and
/// embedded use.
#[must_use]
pub fn add_in_memory_store(service: &ServiceSettings) -> Arc<dyn DocumentDatabase> {
    info!(database = %service.service_name, "Registered in-memory document store");
    Arc::new(InMemoryDatabase::new(service.service_name.clone()))
}

/// Bind a typed repository to a collection of the database.
#[must_use]
pub fn add_repository<T: Entity>(database: &dyn DocumentDatabase, collection_name: &str) -> Arc<dyn Repository<T>> {
    info!(database = database.name(), collection = collection_name, "Registered repository");
    Arc::new(DocumentRepository::<T>::new(database, collection_name))
}

/// A message broker queue bound to a handler type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    /// Broker host address
    pub host: String,
    /// Queue name
    pub name: String,
}

impl BrokerSettings {
    /// Describe the endpoint for handler type `H`.
    #[must_use]
    pub fn endpoint_for<H: ?Sized>(&self) -> BrokerEndpoint {
        BrokerEndpoint {
            host: self.host.clone(),
            name: endpoint_name(short_type_name::<H>()),
        }
    }
}

/// Kebab-case queue name for a handler type name.
///
/// Known handler suffixes are dropped, so `SubmitOrderConsumer` becomes
/// `submit-order` and `HTTPRequestSaga` becomes `http-request`.
#[must_use]
pub fn endpoint_name(type_name: &str) -> String {
    let trimmed = ENDPOINT_SUFFIXES
        .iter()
        .find_map(|suffix| type_name.strip_suffix(suffix).filter(|rest| !rest.is_empty()))
        .unwrap_or(type_name);

    let chars: Vec<char> = trimmed.chars().collect();
    let mut name = String::with_capacity(trimmed.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary {
                name.push('-');
            }
        }
        if c == '_' {
            name.push('-');
        } else {
            name.push(c.to_ascii_lowercase());
        }
    }
    name
}

fn short_type_name<H: ?Sized>() -> &'static str {
    let full = type_name::<H>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
