//! Tracking events: the append-only, newest-first history of a shipment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Known tracking status codes. The set is open: unknown codes are kept
/// verbatim.
pub mod status_codes {
    pub const SHIPMENT_CREATED: &str = "shipment_created";
    pub const LABEL_CREATED: &str = "label_created";
    pub const PROCESSING: &str = "processing";
    pub const ARRIVED_AT_FACILITY: &str = "arrived_at_facility";
    pub const DEPARTED_FACILITY: &str = "departed_facility";
    pub const IN_TRANSIT: &str = "in_transit";
    pub const OUT_FOR_DELIVERY: &str = "out_for_delivery";
    pub const DELIVERY_ATTEMPTED: &str = "delivery_attempted";
    pub const DELIVERED: &str = "delivered";
    pub const EXCEPTION: &str = "exception";
    pub const ON_HOLD: &str = "on_hold";
    pub const PENDING: &str = "pending";
    pub const STATUS_UPDATE: &str = "status_update";
    pub const LOCATION_UPDATED: &str = "location_updated";
}

/// Progress state of a single tracking milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Completed,
    InProgress,
    Pending,
}

/// A stored tracking event. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    /// Assigned on append; absent on events written before ids existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub status: EventStatus,
    pub status_code: String,
    #[serde(default)]
    pub location: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: String,
}

/// A tracking event as submitted by a caller, before the repository
/// assigns its id and (when missing) its timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTrackingEvent {
    pub status: Option<EventStatus>,
    pub status_code: String,
    pub location: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub details: String,
}

impl NewTrackingEvent {
    /// Completes the event for storage.
    ///
    /// The caller validates first; a missing status reads as completed.
    #[must_use]
    pub fn into_event(self, now: DateTime<Utc>) -> TrackingEvent {
        TrackingEvent {
            id: Some(Uuid::now_v7()),
            status: self.status.unwrap_or(EventStatus::Completed),
            status_code: self.status_code,
            location: self.location,
            timestamp: self.timestamp.unwrap_or(now),
            details: self.details,
        }
    }
}
