//! Shared test utilities for microservices-common.
//!
//! This crate provides:
//! - Proptest generators for entities, filters and status codes
//! - A scripted mock HTTP transport
//! - Test fixtures with sample data

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::{SampleItem, SamplePurchase, SampleSearch};
pub use generators::*;
pub use mocks::{MockReply, MockTransport};
