//! # endpointd-server
//!
//! Server for endpointd.
//!
//! This crate provides:
//! - A TLS listener requiring client certificates
//! - One task per connection running a single request/response exchange
//! - Action dispatch to the record store gateway
//! - Pools for serialization builders and read buffers
//! - YAML and environment configuration

pub mod config;
pub mod error;
pub mod handler;
pub mod pool;
pub mod server;
pub mod tls;

pub use config::{Config, ConfigError, NetworkConfig, StorageBackend, StorageConfig, TlsConfig};
pub use error::ServerError;
pub use handler::{ConnectionHandler, ConnectionState, HandlerOutcome};
pub use pool::{Pool, Pooled, Reset};
pub use server::{Server, ServerConfig, ServerStats};
