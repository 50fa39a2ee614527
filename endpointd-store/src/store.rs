//! Gateway trait between the connection handler and storage.

use crate::error::StoreError;
use async_trait::async_trait;
use endpointd_protocol::Endpoint;

/// Operations the connection handler needs from storage.
///
/// Implementations must be safe to share across connection tasks; the
/// handler adds no locking of its own.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Returns every record in storage-defined order.
    async fn list_all(&self) -> Result<Vec<Endpoint>, StoreError>;

    /// Returns the record with `id`, or [`Endpoint::not_found`] when no
    /// record matches. Only storage failures are errors.
    async fn fetch_by_id(&self, id: &str) -> Result<Endpoint, StoreError>;

    /// Inserts a record and returns it with its storage-assigned id.
    async fn create(&self, organization_id: &str, url: &str) -> Result<Endpoint, StoreError>;

    /// Verifies the store is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Releases pooled connections. Later calls fail.
    async fn close(&self) {}

    /// Short backend name for logging.
    fn backend(&self) -> &'static str;
}
