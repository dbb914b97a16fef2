//! End-to-end behavior of `ShipmentRepository` over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use racing::RacingStore;
use shiptrack_core::error::{DomainError, ValidationReason};
use shiptrack_core::notify::ChangeKind;
use shiptrack_core::store::ShipmentStore;
use shiptrack_shipments::application::repository::ShipmentRepository;
use shiptrack_shipments::domain::commands::{
    AddTrackingEvent, ChangeStatus, CreateShipment, DeleteShipment, ShipmentDraft,
    ShipmentPatch, UpdateLocation, UpdateShipment,
};
use shiptrack_shipments::domain::shipment::{Address, Contact, PackageItem, ShipmentStatus};
use shiptrack_shipments::domain::tracking::{EventStatus, NewTrackingEvent};
use shiptrack_store::memory::InMemoryShipmentStore;
use shiptrack_test_support::{
    FixedClock, MockRng, ReadOnlyShipmentStore, RecordingPublisher, fixed_now,
};
use uuid::Uuid;

mod racing {
    //! A store that lets another writer slip in between a repository's
    //! read and its conditional write.

    use super::{AtomicBool, Ordering};
    use serde_json::Value;
    use shiptrack_core::error::DomainError;
    use shiptrack_core::store::{Document, ShipmentStore};
    use shiptrack_store::memory::InMemoryShipmentStore;

    pub struct RacingStore {
        pub inner: InMemoryShipmentStore,
        pub armed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ShipmentStore for RacingStore {
        fn backend_tag(&self) -> &'static str {
            "racing"
        }

        async fn fetch_all(&self) -> Result<Vec<Document>, DomainError> {
            self.inner.fetch_all().await
        }

        async fn fetch_one(&self, key: &str) -> Result<Option<Document>, DomainError> {
            self.inner.fetch_one(key).await
        }

        async fn insert(&self, document: Document) -> Result<Document, DomainError> {
            self.inner.insert(document).await
        }

        async fn merge(
            &self,
            key: &str,
            expected_revision: Option<i64>,
            fields: Document,
        ) -> Result<Document, DomainError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                let mut other = Document::new();
                other.insert("status".to_owned(), Value::from("on_hold"));
                self.inner.merge(key, None, other).await?;
            }
            self.inner.merge(key, expected_revision, fields).await
        }

        async fn delete(&self, key: &str) -> Result<(), DomainError> {
            self.inner.delete(key).await
        }

        async fn append_event(&self, key: &str, event: Value) -> Result<Document, DomainError> {
            self.inner.append_event(key, event).await
        }
    }
}

fn address(city: &str, country: &str) -> Address {
    Address {
        address: "1 Main St".to_owned(),
        city: city.to_owned(),
        state: "NY".to_owned(),
        zip: "10001".to_owned(),
        country: country.to_owned(),
    }
}

fn draft(tracking_number: &str) -> ShipmentDraft {
    ShipmentDraft {
        tracking_number: Some(tracking_number.to_owned()),
        ship_date: NaiveDate::from_ymd_opt(2026, 1, 15),
        estimated_delivery: NaiveDate::from_ymd_opt(2026, 1, 20),
        sender: Contact {
            name: "John Smith".to_owned(),
            ..Contact::default()
        },
        receiver: Contact {
            name: "Sarah Johnson".to_owned(),
            ..Contact::default()
        },
        origin: address("New York", "USA"),
        destination: address("San Francisco", "USA"),
        items: vec![PackageItem {
            description: "Electronics".to_owned(),
            quantity: 1,
            weight: 2.5,
            ..PackageItem::default()
        }],
        ..ShipmentDraft::default()
    }
}

fn create(tracking_number: &str) -> CreateShipment {
    CreateShipment {
        correlation_id: Uuid::new_v4(),
        draft: draft(tracking_number),
    }
}

fn change_status(key: &str, status: ShipmentStatus) -> ChangeStatus {
    ChangeStatus {
        correlation_id: Uuid::new_v4(),
        key: key.to_owned(),
        status,
    }
}

fn repository_over(
    store: Arc<dyn ShipmentStore>,
) -> (ShipmentRepository, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::new());
    let repository = ShipmentRepository::new(
        store,
        publisher.clone(),
        Arc::new(FixedClock(fixed_now())),
        Box::new(MockRng),
    );
    (repository, publisher)
}

#[tokio::test]
async fn test_colliding_create_is_rejected_and_store_unchanged() {
    // Arrange
    let store = Arc::new(InMemoryShipmentStore::new());
    let (repository, publisher) = repository_over(store.clone());
    repository.create_shipment(&create("SHIP0000001")).await.unwrap();

    // Act
    let result = repository.create_shipment(&create("SHIP0000001")).await;

    // Assert
    match result.unwrap_err() {
        DomainError::DuplicateTrackingNumber(tn) => assert_eq!(tn, "SHIP0000001"),
        other => panic!("expected DuplicateTrackingNumber, got {other:?}"),
    }
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(publisher.kinds(), vec![ChangeKind::Created]);
}

#[tokio::test]
async fn test_lookup_by_tracking_number_and_id_agree() {
    let (repository, _) = repository_over(Arc::new(InMemoryShipmentStore::new()));
    let created = repository.create_shipment(&create("SHIP0000001")).await.unwrap();

    let by_tracking = repository.get_shipment("SHIP0000001").await.unwrap();
    let by_id = repository.get_shipment(&created.id.to_string()).await.unwrap();

    assert_eq!(by_tracking, by_id);
    assert_eq!(by_tracking.id, created.id);
}

#[tokio::test]
async fn test_appended_events_stack_newest_first() {
    // Arrange
    let (repository, publisher) = repository_over(Arc::new(InMemoryShipmentStore::new()));
    repository.create_shipment(&create("SHIP0000001")).await.unwrap();
    let codes = ["arrived_at_facility", "departed_facility", "in_transit"];

    // Act
    let mut latest = None;
    for code in codes {
        let command = AddTrackingEvent {
            correlation_id: Uuid::new_v4(),
            key: "SHIP0000001".to_owned(),
            event: NewTrackingEvent {
                status: Some(EventStatus::Completed),
                status_code: code.to_owned(),
                location: "Chicago, IL".to_owned(),
                ..NewTrackingEvent::default()
            },
        };
        latest = Some(repository.add_tracking_event(&command).await.unwrap());
    }

    // Assert
    let shipment = latest.unwrap();
    let stored_codes: Vec<&str> = shipment
        .tracking_history
        .iter()
        .map(|event| event.status_code.as_str())
        .collect();
    assert_eq!(
        stored_codes,
        vec!["in_transit", "departed_facility", "arrived_at_facility", "shipment_created"]
    );
    assert_eq!(shipment.status, ShipmentStatus::Pending);
    assert_eq!(publisher.kinds().len(), 4);
}

#[tokio::test]
async fn test_change_status_sets_status_and_head_event_together() {
    let (repository, _) = repository_over(Arc::new(InMemoryShipmentStore::new()));
    repository.create_shipment(&create("SHIP0000001")).await.unwrap();

    let shipment = repository
        .change_status(&change_status("SHIP0000001", ShipmentStatus::Delivered))
        .await
        .unwrap();

    assert_eq!(shipment.status, ShipmentStatus::Delivered);
    let head = &shipment.tracking_history[0];
    assert_eq!(head.status_code, "delivered");
    assert_eq!(head.status, EventStatus::Completed);
    assert_eq!(head.timestamp, fixed_now());
}

#[tokio::test]
async fn test_delete_is_final_and_frees_tracking_number() {
    // Arrange
    let (repository, publisher) = repository_over(Arc::new(InMemoryShipmentStore::new()));
    let first = repository.create_shipment(&create("SHIP0000001")).await.unwrap();

    // Act
    repository
        .delete_shipment(&DeleteShipment {
            correlation_id: Uuid::new_v4(),
            key: "SHIP0000001".to_owned(),
        })
        .await
        .unwrap();

    // Assert
    assert!(matches!(
        repository.get_shipment("SHIP0000001").await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        repository.get_shipment(&first.id.to_string()).await,
        Err(DomainError::NotFound(_))
    ));
    let second = repository.create_shipment(&create("SHIP0000001")).await.unwrap();
    assert_ne!(second.id, first.id);
    let deleted = &publisher.published()[1];
    assert_eq!(deleted.kind, ChangeKind::Deleted);
    assert_eq!(deleted.data["trackingNumber"], "SHIP0000001");
}

#[tokio::test]
async fn test_empty_items_are_rejected_before_persisting() {
    let store = Arc::new(InMemoryShipmentStore::new());
    let (repository, publisher) = repository_over(store.clone());
    let mut command = create("SHIP0000001");
    command.draft.items.clear();

    let result = repository.create_shipment(&command).await;

    match result.unwrap_err() {
        DomainError::Validation(err) => {
            assert_eq!(err.field, "items");
            assert_eq!(err.reason, ValidationReason::TooShort);
        }
        other => panic!("expected Validation, got {other:?}"),
    }
    assert!(store.is_empty().unwrap());
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn test_processing_then_delivered_scenario() {
    // Arrange
    let (repository, _) = repository_over(Arc::new(InMemoryShipmentStore::new()));
    repository.create_shipment(&create("SHIP0000001")).await.unwrap();

    // Act
    let processing = repository
        .change_status(&change_status("SHIP0000001", ShipmentStatus::Processing))
        .await
        .unwrap();
    let delivered = repository
        .change_status(&change_status("SHIP0000001", ShipmentStatus::Delivered))
        .await
        .unwrap();

    // Assert
    assert_eq!(delivered.status, ShipmentStatus::Delivered);
    let codes: Vec<&str> = delivered
        .tracking_history
        .iter()
        .map(|event| event.status_code.as_str())
        .collect();
    assert_eq!(codes, vec!["delivered", "processing", "shipment_created"]);
    assert_eq!(
        delivered.tracking_history[0].location,
        processing.tracking_history[0].location
    );
    assert_eq!(delivered.tracking_history[0].location, "New York, USA");
}

#[tokio::test]
async fn test_status_change_is_located_at_newest_event_not_origin() {
    // Arrange
    let (repository, _) = repository_over(Arc::new(InMemoryShipmentStore::new()));
    repository.create_shipment(&create("SHIP0000001")).await.unwrap();
    repository
        .update_location(&UpdateLocation {
            correlation_id: Uuid::new_v4(),
            key: "SHIP0000001".to_owned(),
            location: "Denver, CO".to_owned(),
            details: None,
        })
        .await
        .unwrap();

    // Act
    let shipment = repository
        .change_status(&change_status("SHIP0000001", ShipmentStatus::InTransit))
        .await
        .unwrap();

    // Assert
    assert_eq!(shipment.status, ShipmentStatus::InTransit);
    assert_eq!(shipment.tracking_history.len(), 3);
    assert_eq!(shipment.tracking_history[0].status_code, "in_transit");
    assert_eq!(shipment.tracking_history[0].location, "Denver, CO");
    assert_eq!(shipment.tracking_history[2].location, "New York, USA");
}

#[tokio::test]
async fn test_write_racing_another_writer_fails_with_conflict() {
    // Arrange
    let store = Arc::new(RacingStore {
        inner: InMemoryShipmentStore::new(),
        armed: AtomicBool::new(false),
    });
    let (repository, publisher) = repository_over(store.clone());
    repository.create_shipment(&create("SHIP0000001")).await.unwrap();
    let before = repository.cached_shipments();
    store.armed.store(true, Ordering::SeqCst);

    // Act
    let result = repository
        .update_shipment(&UpdateShipment {
            correlation_id: Uuid::new_v4(),
            key: "SHIP0000001".to_owned(),
            patch: ShipmentPatch {
                status: Some(ShipmentStatus::Processing),
                ..ShipmentPatch::default()
            },
        })
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
    assert_eq!(repository.cached_shipments(), before);
    assert_eq!(publisher.kinds(), vec![ChangeKind::Created]);
    let stored = repository.get_shipment("SHIP0000001").await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::OnHold);
}

#[tokio::test]
async fn test_store_failure_leaves_view_unchanged_and_broadcasts_nothing() {
    // Arrange: seed through a writable repository, then switch to a
    // read-only view of the same store.
    let inner = Arc::new(InMemoryShipmentStore::new());
    let (writer, _) = repository_over(inner.clone());
    writer.create_shipment(&create("SHIP0000001")).await.unwrap();
    let (repository, publisher) = repository_over(Arc::new(ReadOnlyShipmentStore::new(inner)));
    let before = repository.list_shipments().await.unwrap();

    // Act
    let status = repository
        .change_status(&change_status("SHIP0000001", ShipmentStatus::InTransit))
        .await;
    let event = repository
        .add_tracking_event(&AddTrackingEvent {
            correlation_id: Uuid::new_v4(),
            key: "SHIP0000001".to_owned(),
            event: NewTrackingEvent {
                status: Some(EventStatus::InProgress),
                status_code: "in_transit".to_owned(),
                ..NewTrackingEvent::default()
            },
        })
        .await;

    // Assert
    assert!(matches!(status, Err(DomainError::StoreUnavailable(_))));
    assert!(matches!(event, Err(DomainError::StoreUnavailable(_))));
    assert_eq!(repository.cached_shipments(), before);
    assert!(publisher.published().is_empty());
}
