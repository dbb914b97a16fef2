//! In-memory implementation of the `ShipmentStore` trait.
//!
//! Holds the collection in a `Vec`, newest insert first. The lock is only
//! held for synchronous splicing, never across an await point.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use shiptrack_core::error::DomainError;
use shiptrack_core::store::{
    Document, ShipmentStore, check_insertable, check_revision, merge_fields, position_by_key,
    prepend_event, stamp_inserted,
};

/// Process-local shipment store.
#[derive(Debug, Default)]
pub struct InMemoryShipmentStore {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryShipmentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `documents`, kept in the given
    /// order.
    #[must_use]
    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreUnavailable` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, DomainError> {
        Ok(self.read()?.len())
    }

    /// Whether the store holds no documents.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreUnavailable` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Document>>, DomainError> {
        self.documents
            .read()
            .map_err(|e| DomainError::StoreUnavailable(format!("store lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Document>>, DomainError> {
        self.documents
            .write()
            .map_err(|e| DomainError::StoreUnavailable(format!("store lock poisoned: {e}")))
    }
}

#[async_trait]
impl ShipmentStore for InMemoryShipmentStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn fetch_all(&self) -> Result<Vec<Document>, DomainError> {
        Ok(self.read()?.clone())
    }

    async fn fetch_one(&self, key: &str) -> Result<Option<Document>, DomainError> {
        let documents = self.read()?;
        Ok(position_by_key(&documents, key).map(|index| documents[index].clone()))
    }

    async fn insert(&self, mut document: Document) -> Result<Document, DomainError> {
        let mut documents = self.write()?;
        check_insertable(&documents, &document)?;
        stamp_inserted(&mut document);
        documents.insert(0, document.clone());
        debug!(count = documents.len(), "inserted shipment document");
        Ok(document)
    }

    async fn merge(
        &self,
        key: &str,
        expected_revision: Option<i64>,
        fields: Document,
    ) -> Result<Document, DomainError> {
        let mut documents = self.write()?;
        let index =
            position_by_key(&documents, key).ok_or_else(|| DomainError::NotFound(key.to_owned()))?;
        let document = &mut documents[index];
        check_revision(document, key, expected_revision)?;
        merge_fields(document, fields);
        Ok(document.clone())
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        let mut documents = self.write()?;
        let index =
            position_by_key(&documents, key).ok_or_else(|| DomainError::NotFound(key.to_owned()))?;
        documents.remove(index);
        Ok(())
    }

    async fn append_event(&self, key: &str, event: Value) -> Result<Document, DomainError> {
        let mut documents = self.write()?;
        let index =
            position_by_key(&documents, key).ok_or_else(|| DomainError::NotFound(key.to_owned()))?;
        let document = &mut documents[index];
        prepend_event(document, event);
        Ok(document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    fn shipment_doc(id: &str, tracking_number: &str) -> Document {
        doc(json!({
            "id": id,
            "trackingNumber": tracking_number,
            "status": "pending",
            "trackingHistory": [{"statusCode": "shipment_created"}]
        }))
    }

    #[tokio::test]
    async fn test_insert_stamps_revision_and_lists_newest_first() {
        // Arrange
        let store = InMemoryShipmentStore::new();

        // Act
        store.insert(shipment_doc("a", "SHIP0000001")).await.unwrap();
        let stored = store.insert(shipment_doc("b", "SHIP0000002")).await.unwrap();

        // Assert
        assert_eq!(stored["revision"], 1);
        let all = store.fetch_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["id"], "b");
        assert_eq!(all[1]["id"], "a");
    }

    #[tokio::test]
    async fn test_with_documents_keeps_given_order_and_resolves_both_keys() {
        // Arrange
        let store = InMemoryShipmentStore::with_documents(vec![
            shipment_doc("b", "SHIP0000002"),
            shipment_doc("a", "SHIP0000001"),
        ]);

        // Act
        let all = store.fetch_all().await.unwrap();
        let by_number = store.fetch_one("SHIP0000001").await.unwrap();
        let by_id = store.fetch_one("a").await.unwrap();

        // Assert
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(all[0]["id"], "b");
        assert_eq!(by_number, by_id);
        assert_eq!(by_id.unwrap()["trackingNumber"], "SHIP0000001");
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_tracking_number_and_leaves_store_unchanged() {
        // Arrange
        let store = InMemoryShipmentStore::new();
        store.insert(shipment_doc("a", "SHIP0000001")).await.unwrap();

        // Act
        let result = store.insert(shipment_doc("b", "SHIP0000001")).await;

        // Assert
        assert!(matches!(result, Err(DomainError::DuplicateTrackingNumber(_))));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_one_resolves_tracking_number_and_id() {
        let store = InMemoryShipmentStore::new();
        store.insert(shipment_doc("a", "SHIP0000001")).await.unwrap();

        let by_tracking = store.fetch_one("SHIP0000001").await.unwrap().unwrap();
        let by_id = store.fetch_one("a").await.unwrap().unwrap();

        assert_eq!(by_tracking, by_id);
        assert!(store.fetch_one("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_with_stale_revision_returns_conflict() {
        // Arrange
        let store = InMemoryShipmentStore::new();
        store.insert(shipment_doc("a", "SHIP0000001")).await.unwrap();
        store
            .merge("a", Some(1), doc(json!({"status": "processing"})))
            .await
            .unwrap();

        // Act: a second writer still holding revision 1.
        let result = store
            .merge("a", Some(1), doc(json!({"status": "delivered"})))
            .await;

        // Assert
        match result.unwrap_err() {
            DomainError::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
        let current = store.fetch_one("a").await.unwrap().unwrap();
        assert_eq!(current["status"], "processing");
    }

    #[tokio::test]
    async fn test_append_event_prepends_to_history() {
        let store = InMemoryShipmentStore::new();
        store.insert(shipment_doc("a", "SHIP0000001")).await.unwrap();

        let updated = store
            .append_event("SHIP0000001", json!({"statusCode": "in_transit"}))
            .await
            .unwrap();

        let history = updated["trackingHistory"].as_array().unwrap();
        assert_eq!(history[0]["statusCode"], "in_transit");
        assert_eq!(history[1]["statusCode"], "shipment_created");
        assert_eq!(updated["revision"], 2);
    }

    #[tokio::test]
    async fn test_delete_missing_key_returns_not_found() {
        let store = InMemoryShipmentStore::new();

        let result = store.delete("nope").await;

        match result.unwrap_err() {
            DomainError::NotFound(key) => assert_eq!(key, "nope"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
