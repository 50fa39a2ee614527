//! In-memory store.

use crate::error::StoreError;
use crate::store::EndpointStore;
use async_trait::async_trait;
use dashmap::DashMap;
use endpointd_protocol::Endpoint;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Store keeping records in a concurrent map. Ids are random UUIDs.
#[derive(Debug, Default)]
pub struct MemoryEndpointStore {
    endpoints: DashMap<String, Endpoint>,
    closed: AtomicBool,
}

impl MemoryEndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record as-is, replacing any record with the same id.
    pub fn insert(&self, endpoint: Endpoint) {
        self.endpoints.insert(endpoint.id.clone(), endpoint);
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl EndpointStore for MemoryEndpointStore {
    async fn list_all(&self) -> Result<Vec<Endpoint>, StoreError> {
        self.check_open()?;
        Ok(self
            .endpoints
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Endpoint, StoreError> {
        self.check_open()?;
        Ok(match self.endpoints.get(id) {
            Some(entry) => entry.value().clone(),
            None => Endpoint::not_found(id),
        })
    }

    async fn create(&self, organization_id: &str, url: &str) -> Result<Endpoint, StoreError> {
        self.check_open()?;
        let endpoint = Endpoint::new(Uuid::new_v4().to_string(), organization_id, url);
        self.endpoints
            .insert(endpoint.id.clone(), endpoint.clone());
        Ok(endpoint)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_open()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use endpointd_protocol::NOT_FOUND;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_assigns_id() {
        let store = MemoryEndpointStore::new();
        let created = store.create("org1", "http://x").await.unwrap();

        assert!(!created.id.is_empty());
        assert_eq!(created.organization_id, "org1");
        assert_eq!(created.url, "http://x");
        assert_eq!(created.schema, "");
        assert!(!created.is_error());

        let fetched = store.fetch_by_id(&created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_fetch_missing_returns_marker() {
        let store = MemoryEndpointStore::new();
        let missing = store.fetch_by_id("nope").await.unwrap();

        assert_eq!(missing.id, "nope");
        assert_eq!(missing.error, NOT_FOUND);
        assert!(missing.organization_id.is_empty());
        assert!(missing.url.is_empty());
        assert!(missing.schema.is_empty());
    }

    #[tokio::test]
    async fn test_list_all_is_complete() {
        let store = MemoryEndpointStore::new();
        assert!(store.list_all().await.unwrap().is_empty());

        let mut ids = HashSet::new();
        for url in ["http://a", "http://b", "http://c"] {
            ids.insert(store.create("org", url).await.unwrap().id);
        }

        let listed: HashSet<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, ids);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_insert_keeps_schema() {
        let store = MemoryEndpointStore::new();
        store.insert(Endpoint::new("fixed", "org", "http://s").with_schema("{}"));

        let fetched = store.fetch_by_id("fixed").await.unwrap();
        assert_eq!(fetched.schema, "{}");
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_ids() {
        let store = Arc::new(MemoryEndpointStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create(&format!("org{}", i), &format!("http://{}", i))
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 32);
        assert_eq!(store.len(), 32);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let store = MemoryEndpointStore::new();
        store.ping().await.unwrap();
        store.close().await;

        assert!(matches!(store.ping().await, Err(StoreError::Closed)));
        assert!(matches!(store.list_all().await, Err(StoreError::Closed)));
        assert!(matches!(
            store.create("org", "http://x").await,
            Err(StoreError::Closed)
        ));
    }
}
