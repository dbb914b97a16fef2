//! The shipment repository.
//!
//! Sits between callers and the `ShipmentStore`: validates commands before
//! anything reaches the store, keeps a local view of the last documents it
//! saw, and publishes one `ShipmentChange` per successful mutation. The
//! local view is only touched after the store has accepted a write, so a
//! failed mutation leaves it (and subscribers) untouched.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use shiptrack_core::clock::Clock;
use shiptrack_core::command::Command;
use shiptrack_core::error::{DomainError, ValidationError, ValidationReason};
use shiptrack_core::notify::{ChangeKind, ChangePublisher, ShipmentChange};
use shiptrack_core::rng::DeterministicRng;
use shiptrack_core::store::{
    Document, HISTORY_FIELD, ID_FIELD, ShipmentStore, TRACKING_NUMBER_FIELD, document_revision,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::query_handlers::{
    ShipmentQuery, ShipmentStats, filter_shipments, summarize,
};
use crate::application::seed::SeedShipment;
use crate::domain::commands::{
    AddTrackingEvent, BulkChangeStatus, BulkDelete, ChangeStatus, CreateShipment,
    DeleteShipment, ShipmentDraft, UpdateLocation, UpdateShipment,
};
use crate::domain::shipment::{Shipment, generate_tracking_number};
use crate::domain::status::implied_status;
use crate::domain::tracking::{EventStatus, NewTrackingEvent, TrackingEvent, status_codes};
use crate::domain::validation;

/// Give up drawing tracking numbers after this many collisions.
const MAX_TRACKING_NUMBER_DRAWS: usize = 64;

const STATUS_FIELD: &str = "status";
const UPDATED_AT_FIELD: &str = "updatedAt";

fn to_shipment(document: Document) -> Result<Shipment, DomainError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| DomainError::StoreUnavailable(format!("malformed shipment document: {e}")))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, DomainError> {
    serde_json::to_value(value)
        .map_err(|e| DomainError::StoreUnavailable(format!("document serialization failed: {e}")))
}

fn to_document(shipment: &Shipment) -> Result<Document, DomainError> {
    match to_value(shipment)? {
        Value::Object(document) => Ok(document),
        _ => Err(DomainError::StoreUnavailable(
            "shipment did not serialize to an object".to_owned(),
        )),
    }
}

/// Keyed access to shipments with a local view and change notifications.
pub struct ShipmentRepository {
    store: Arc<dyn ShipmentStore>,
    publisher: Arc<dyn ChangePublisher>,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn DeterministicRng>>,
    cache: RwLock<Vec<Shipment>>,
}

impl std::fmt::Debug for ShipmentRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipmentRepository")
            .field("store", &self.store.backend_tag())
            .finish_non_exhaustive()
    }
}

impl ShipmentRepository {
    /// Creates a repository over `store`. The clock stamps timestamps and
    /// the RNG draws generated tracking numbers.
    #[must_use]
    pub fn new(
        store: Arc<dyn ShipmentStore>,
        publisher: Arc<dyn ChangePublisher>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn DeterministicRng>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            rng: Mutex::new(rng),
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Short name of the backing store.
    #[must_use]
    pub fn backend_tag(&self) -> &'static str {
        self.store.backend_tag()
    }

    // --- local view ---

    /// Snapshot of the local view, as of the last listing or write.
    #[must_use]
    pub fn cached_shipments(&self) -> Vec<Shipment> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_cache(&self, shipments: &[Shipment]) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
        cache.extend_from_slice(shipments);
    }

    fn upsert_cached(&self, shipment: &Shipment) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        match cache.iter_mut().find(|cached| cached.id == shipment.id) {
            Some(cached) => *cached = shipment.clone(),
            None => cache.insert(0, shipment.clone()),
        }
    }

    fn evict_cached(&self, id: Uuid) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|cached| cached.id != id);
    }

    fn publish(&self, kind: ChangeKind, data: Value, correlation_id: Uuid) {
        self.publisher.publish(ShipmentChange {
            kind,
            data,
            correlation_id,
            occurred_at: self.clock.now(),
        });
    }

    /// Records a stored document locally and announces it.
    fn commit(
        &self,
        kind: ChangeKind,
        document: Document,
        correlation_id: Uuid,
    ) -> Result<Shipment, DomainError> {
        let shipment = to_shipment(document.clone())?;
        self.upsert_cached(&shipment);
        self.publish(kind, Value::Object(document), correlation_id);
        Ok(shipment)
    }

    async fn fetch_document(&self, key: &str) -> Result<Document, DomainError> {
        self.store
            .fetch_one(key)
            .await?
            .ok_or_else(|| DomainError::NotFound(key.to_owned()))
    }

    // --- reads ---

    /// Fetches the whole collection and refreshes the local view.
    /// Documents that do not parse as shipments are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreUnavailable` if the store cannot be read.
    #[instrument(skip(self))]
    pub async fn list_shipments(&self) -> Result<Vec<Shipment>, DomainError> {
        let documents = self.store.fetch_all().await?;
        let mut shipments = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document.get(ID_FIELD).cloned().unwrap_or(Value::Null);
            match to_shipment(document) {
                Ok(shipment) => shipments.push(shipment),
                Err(e) => warn!(%id, error = %e, "skipping unreadable shipment document"),
            }
        }
        self.replace_cache(&shipments);
        debug!(count = shipments.len(), "shipments listed");
        Ok(shipments)
    }

    /// Looks a shipment up by tracking number, falling back to id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if neither matches.
    #[instrument(skip(self))]
    pub async fn get_shipment(&self, key: &str) -> Result<Shipment, DomainError> {
        let shipment = to_shipment(self.fetch_document(key).await?)?;
        self.upsert_cached(&shipment);
        Ok(shipment)
    }

    /// Lists shipments matching `query`, in the requested order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreUnavailable` if the store cannot be read.
    pub async fn search(&self, query: &ShipmentQuery) -> Result<Vec<Shipment>, DomainError> {
        Ok(filter_shipments(self.list_shipments().await?, query))
    }

    /// Totals per status over the whole collection.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreUnavailable` if the store cannot be read.
    pub async fn dashboard_stats(&self) -> Result<ShipmentStats, DomainError> {
        Ok(summarize(&self.list_shipments().await?))
    }

    /// Whether the store answers a full read.
    pub async fn health_check(&self) -> bool {
        match self.store.fetch_all().await {
            Ok(_) => true,
            Err(e) => {
                warn!(backend = self.store.backend_tag(), error = %e, "store health check failed");
                false
            }
        }
    }

    // --- writes ---

    /// Picks the tracking number for a new shipment: the draft's, if it is
    /// free, or a freshly drawn one.
    fn choose_tracking_number(
        &self,
        draft: &ShipmentDraft,
        existing: &[Document],
    ) -> Result<String, DomainError> {
        let taken: HashSet<&str> = existing
            .iter()
            .filter_map(|doc| doc.get(TRACKING_NUMBER_FIELD).and_then(Value::as_str))
            .collect();

        if let Some(requested) = draft
            .tracking_number
            .as_deref()
            .filter(|requested| !requested.trim().is_empty())
        {
            if taken.contains(requested) {
                return Err(DomainError::DuplicateTrackingNumber(requested.to_owned()));
            }
            return Ok(requested.to_owned());
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = generate_tracking_number(rng.as_mut());
        for _ in 1..MAX_TRACKING_NUMBER_DRAWS {
            if !taken.contains(candidate.as_str()) {
                return Ok(candidate);
            }
            debug!(%candidate, "generated tracking number taken, drawing again");
            candidate = generate_tracking_number(rng.as_mut());
        }
        if taken.contains(candidate.as_str()) {
            return Err(DomainError::DuplicateTrackingNumber(candidate));
        }
        Ok(candidate)
    }

    async fn insert_new(
        &self,
        draft: ShipmentDraft,
        history: Vec<NewTrackingEvent>,
        correlation_id: Uuid,
    ) -> Result<Shipment, DomainError> {
        validation::validate_draft(&draft)?;
        for event in &history {
            validation::validate_event(event)?;
        }

        let existing = self.store.fetch_all().await?;
        let tracking_number = self.choose_tracking_number(&draft, &existing)?;
        let now = self.clock.now();
        let mut shipment = Shipment::create(draft, Uuid::now_v7(), tracking_number, now)?;
        if !history.is_empty() {
            shipment.tracking_history = history
                .into_iter()
                .map(|event| event.into_event(now))
                .collect();
        }

        let stored = self.store.insert(to_document(&shipment)?).await?;
        let shipment = self.commit(ChangeKind::Created, stored, correlation_id)?;
        info!(
            correlation_id = %correlation_id,
            tracking_number = %shipment.tracking_number,
            shipment_id = %shipment.id,
            "shipment created"
        );
        Ok(shipment)
    }

    /// Creates a shipment, seeding its history with the creation event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a bad draft (nothing is sent
    /// to the store) and `DomainError::DuplicateTrackingNumber` when the
    /// tracking number is taken.
    #[instrument(skip(self, command), fields(correlation_id = %command.correlation_id, command_type = command.command_type()))]
    pub async fn create_shipment(&self, command: &CreateShipment) -> Result<Shipment, DomainError> {
        self.insert_new(command.draft.clone(), Vec::new(), command.correlation_id)
            .await
    }

    /// Applies a partial update. An update with no writable field returns
    /// the shipment unchanged without writing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for invalid nested records or an
    /// attempt to change `id` or `trackingNumber`, `DomainError::NotFound`
    /// for an unknown key and `DomainError::Conflict` if the shipment
    /// changed since it was read.
    #[instrument(skip(self, command), fields(correlation_id = %command.correlation_id, key = %command.key))]
    pub async fn update_shipment(&self, command: &UpdateShipment) -> Result<Shipment, DomainError> {
        validation::validate_patch(&command.patch)?;
        let current_document = self.fetch_document(&command.key).await?;
        let revision = document_revision(&current_document);
        let current = to_shipment(current_document)?;

        if command.patch.id.is_some_and(|id| id != current.id) {
            return Err(ValidationError::new(ID_FIELD, ValidationReason::BadFormat).into());
        }
        if command
            .patch
            .tracking_number
            .as_deref()
            .is_some_and(|tn| tn != current.tracking_number)
        {
            return Err(
                ValidationError::new(TRACKING_NUMBER_FIELD, ValidationReason::BadFormat).into(),
            );
        }

        let mut fields = command.patch.to_fields();
        if fields.is_empty() {
            return Ok(current);
        }
        fields.insert(UPDATED_AT_FIELD.to_owned(), to_value(&self.clock.now())?);

        let merged = self
            .store
            .merge(&current.id.to_string(), Some(revision), fields)
            .await?;
        let shipment = self.commit(ChangeKind::Updated, merged, command.correlation_id)?;
        info!(tracking_number = %shipment.tracking_number, "shipment updated");
        Ok(shipment)
    }

    /// Deletes a shipment permanently. Its tracking number becomes free;
    /// its id is never handed out again.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown key.
    #[instrument(skip(self, command), fields(correlation_id = %command.correlation_id, key = %command.key))]
    pub async fn delete_shipment(&self, command: &DeleteShipment) -> Result<(), DomainError> {
        let current = to_shipment(self.fetch_document(&command.key).await?)?;
        self.store.delete(&current.id.to_string()).await?;
        self.evict_cached(current.id);
        self.publish(
            ChangeKind::Deleted,
            serde_json::json!({
                ID_FIELD: current.id,
                TRACKING_NUMBER_FIELD: current.tracking_number,
            }),
            command.correlation_id,
        );
        info!(tracking_number = %current.tracking_number, "shipment deleted");
        Ok(())
    }

    /// Sets the status and prepends the matching event in one conditional
    /// write. The event is located where the shipment was last seen.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown key and
    /// `DomainError::Conflict` if the shipment changed since it was read.
    #[instrument(skip(self, command), fields(correlation_id = %command.correlation_id, key = %command.key, status = %command.status))]
    pub async fn change_status(&self, command: &ChangeStatus) -> Result<Shipment, DomainError> {
        let mut current_document = self.fetch_document(&command.key).await?;
        let revision = document_revision(&current_document);
        let current = to_shipment(current_document.clone())?;
        let now = self.clock.now();

        let event = TrackingEvent {
            id: Some(Uuid::now_v7()),
            status: EventStatus::Completed,
            status_code: command.status.as_str().to_owned(),
            location: current.last_known_location(),
            timestamp: now,
            details: format!("Status updated to {}", command.status),
        };
        // Work on the stored array so events this model does not know keep
        // their extra fields.
        let mut history = match current_document.remove(HISTORY_FIELD) {
            Some(Value::Array(events)) => events,
            _ => Vec::new(),
        };
        history.insert(0, to_value(&event)?);

        let mut fields = Document::new();
        fields.insert(STATUS_FIELD.to_owned(), to_value(&command.status)?);
        fields.insert(HISTORY_FIELD.to_owned(), Value::Array(history));
        fields.insert(UPDATED_AT_FIELD.to_owned(), to_value(&now)?);

        let merged = self
            .store
            .merge(&current.id.to_string(), Some(revision), fields)
            .await?;
        let shipment = self.commit(ChangeKind::Updated, merged, command.correlation_id)?;
        info!(
            tracking_number = %shipment.tracking_number,
            from = %current.status,
            to = %shipment.status,
            "shipment status changed"
        );
        Ok(shipment)
    }

    async fn append_event(
        &self,
        key: &str,
        event: NewTrackingEvent,
        correlation_id: Uuid,
    ) -> Result<Shipment, DomainError> {
        validation::validate_event(&event)?;
        let event = event.into_event(self.clock.now());
        let stored = self.store.append_event(key, to_value(&event)?).await?;
        let shipment = self.commit(ChangeKind::TrackingUpdated, stored, correlation_id)?;

        if let Some(implied) = implied_status(&event.status_code)
            && implied != shipment.status
        {
            warn!(
                tracking_number = %shipment.tracking_number,
                status = %shipment.status,
                status_code = %event.status_code,
                "newest tracking event disagrees with shipment status"
            );
        }
        info!(
            tracking_number = %shipment.tracking_number,
            status_code = %event.status_code,
            "tracking event added"
        );
        Ok(shipment)
    }

    /// Prepends a tracking event. The shipment's status is left alone.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an incomplete event and
    /// `DomainError::NotFound` for an unknown key.
    #[instrument(skip(self, command), fields(correlation_id = %command.correlation_id, key = %command.key))]
    pub async fn add_tracking_event(
        &self,
        command: &AddTrackingEvent,
    ) -> Result<Shipment, DomainError> {
        self.append_event(&command.key, command.event.clone(), command.correlation_id)
            .await
    }

    /// Records a new location as a completed `location_updated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank location and
    /// `DomainError::NotFound` for an unknown key.
    #[instrument(skip(self, command), fields(correlation_id = %command.correlation_id, key = %command.key))]
    pub async fn update_location(&self, command: &UpdateLocation) -> Result<Shipment, DomainError> {
        let location = command.location.trim();
        if location.is_empty() {
            return Err(ValidationError::required("location").into());
        }
        let details = command
            .details
            .as_deref()
            .map(str::trim)
            .filter(|details| !details.is_empty())
            .map_or_else(|| format!("Location updated to {location}"), str::to_owned);
        let event = NewTrackingEvent {
            status: Some(EventStatus::Completed),
            status_code: status_codes::LOCATION_UPDATED.to_owned(),
            location: location.to_owned(),
            timestamp: None,
            details,
        };
        self.append_event(&command.key, event, command.correlation_id)
            .await
    }

    /// Changes the status of each key in order, stopping at the first
    /// failure. Shipments before the failing key keep their new status.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    #[instrument(skip(self, command), fields(correlation_id = %command.correlation_id, count = command.keys.len()))]
    pub async fn bulk_change_status(
        &self,
        command: &BulkChangeStatus,
    ) -> Result<Vec<Shipment>, DomainError> {
        let mut changed = Vec::with_capacity(command.keys.len());
        for key in &command.keys {
            let single = ChangeStatus {
                correlation_id: command.correlation_id,
                key: key.clone(),
                status: command.status,
            };
            changed.push(self.change_status(&single).await?);
        }
        Ok(changed)
    }

    /// Deletes each key in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    #[instrument(skip(self, command), fields(correlation_id = %command.correlation_id, count = command.keys.len()))]
    pub async fn bulk_delete(&self, command: &BulkDelete) -> Result<usize, DomainError> {
        for key in &command.keys {
            let single = DeleteShipment {
                correlation_id: command.correlation_id,
                key: key.clone(),
            };
            self.delete_shipment(&single).await?;
        }
        Ok(command.keys.len())
    }

    /// Creates the demo shipments if, and only if, the store is empty.
    /// Returns how many were created.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while creating a seed shipment.
    #[instrument(skip(self, seeds), fields(count = seeds.len()))]
    pub async fn seed_if_empty(
        &self,
        seeds: Vec<SeedShipment>,
        correlation_id: Uuid,
    ) -> Result<usize, DomainError> {
        if !self.store.fetch_all().await?.is_empty() {
            debug!("store already holds shipments, skipping seed");
            return Ok(0);
        }
        let mut created = 0;
        for seed in seeds {
            self.insert_new(seed.draft, seed.tracking_history, correlation_id)
                .await?;
            created += 1;
        }
        info!(created, "store seeded with demo shipments");
        Ok(created)
    }
}
