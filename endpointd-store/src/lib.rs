//! # endpointd-store
//!
//! Record store gateway for endpointd.
//!
//! This crate provides:
//! - The `EndpointStore` trait used by the connection handler
//! - A PostgreSQL implementation backed by a sqlx connection pool
//! - An in-memory implementation for tests and local development

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryEndpointStore;
pub use postgres::PgEndpointStore;
pub use store::EndpointStore;
