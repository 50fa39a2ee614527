//! # endpointd-client
//!
//! Client library for endpointd.
//!
//! This crate provides:
//! - Mutually authenticated TLS connections
//! - One request/response exchange per connection
//! - High-level API for the Index, Read and New actions

pub mod client;
pub mod connection;
pub mod error;
pub mod tls;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig, TlsClientConfig};
pub use error::ClientError;
