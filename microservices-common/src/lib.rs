//! Shared toolkit for independent microservices.
//!
//! This crate provides:
//! - A typed JSON HTTP client behind timeout, retry and circuit breaker
//!   policies
//! - Query string building from any serializable request record
//! - A generic typed repository over a document store (MongoDB or
//!   in-memory), with composable filters
//! - Settings loading and startup registration helpers
//! - Structured logging setup and client metrics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod client;
pub mod error;
pub mod filter;
pub mod http;
pub mod metrics;
pub mod mongo;
pub mod query;
pub mod registration;
pub mod repository;
pub mod retry;
pub mod settings;
pub mod store;
pub mod timeout;
pub mod tracing_config;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{ResiliencePolicy, ResilientClient};
pub use error::{CommonError, CommonResult};
pub use filter::Filter;
pub use http::{HttpTransport, OutboundRequest, RawResponse, ReqwestTransport};
pub use mongo::MongoDatabase;
pub use query::build_query;
pub use registration::{add_document_store, add_http_client, add_in_memory_store, add_repository, endpoint_name};
pub use repository::{DocumentRepository, Entity, Repository};
pub use retry::{RetryConfig, RetryPolicy};
pub use settings::{BrokerSettings, ConfigError, DocumentStoreSettings, HttpClientSettings, ServiceSettings};
pub use store::{Document, DocumentCollection, DocumentDatabase, InMemoryDatabase};
pub use tracing_config::{TracingConfig, init_tracing, try_init_tracing};
