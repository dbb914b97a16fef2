//! Test stores: mock `ShipmentStore` implementations for tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shiptrack_core::error::DomainError;
use shiptrack_core::store::{Document, ShipmentStore};

/// A store that always returns a `StoreUnavailable` error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingShipmentStore;

fn unavailable() -> DomainError {
    DomainError::StoreUnavailable("connection refused".into())
}

#[async_trait]
impl ShipmentStore for FailingShipmentStore {
    fn backend_tag(&self) -> &'static str {
        "failing"
    }

    async fn fetch_all(&self) -> Result<Vec<Document>, DomainError> {
        Err(unavailable())
    }

    async fn fetch_one(&self, _key: &str) -> Result<Option<Document>, DomainError> {
        Err(unavailable())
    }

    async fn insert(&self, _document: Document) -> Result<Document, DomainError> {
        Err(unavailable())
    }

    async fn merge(
        &self,
        _key: &str,
        _expected_revision: Option<i64>,
        _fields: Document,
    ) -> Result<Document, DomainError> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), DomainError> {
        Err(unavailable())
    }

    async fn append_event(&self, _key: &str, _event: Value) -> Result<Document, DomainError> {
        Err(unavailable())
    }
}

/// A store that serves reads from `inner` but fails every write. Useful for
/// checking that a failed mutation leaves previously read state untouched.
pub struct ReadOnlyShipmentStore {
    inner: Arc<dyn ShipmentStore>,
}

impl ReadOnlyShipmentStore {
    /// Wraps `inner`, which stays shared with the caller.
    #[must_use]
    pub fn new(inner: Arc<dyn ShipmentStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ShipmentStore for ReadOnlyShipmentStore {
    fn backend_tag(&self) -> &'static str {
        "read-only"
    }

    async fn fetch_all(&self) -> Result<Vec<Document>, DomainError> {
        self.inner.fetch_all().await
    }

    async fn fetch_one(&self, key: &str) -> Result<Option<Document>, DomainError> {
        self.inner.fetch_one(key).await
    }

    async fn insert(&self, _document: Document) -> Result<Document, DomainError> {
        Err(unavailable())
    }

    async fn merge(
        &self,
        _key: &str,
        _expected_revision: Option<i64>,
        _fields: Document,
    ) -> Result<Document, DomainError> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), DomainError> {
        Err(unavailable())
    }

    async fn append_event(&self, _key: &str, _event: Value) -> Result<Document, DomainError> {
        Err(unavailable())
    }
}
