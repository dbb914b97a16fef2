//! Change notifications.
//!
//! A successful mutation produces one `ShipmentChange`. Notifications are
//! advisory: a subscriber treats one as a hint to refetch, never as the
//! source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What happened to a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A shipment was created.
    Created,
    /// Top-level fields or the status changed.
    Updated,
    /// A shipment was removed.
    Deleted,
    /// A tracking event was appended.
    TrackingUpdated,
}

impl ChangeKind {
    /// Returns the wire name of the change type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::TrackingUpdated => "tracking_updated",
        }
    }
}

/// Broadcast payload: `{type, data}` plus tracing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentChange {
    /// Change type.
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// The shipment document after the change, or its identifiers for a
    /// deletion.
    pub data: Value,
    /// Correlation ID of the command that caused the change.
    pub correlation_id: Uuid,
    /// When the change was committed to the store.
    pub occurred_at: DateTime<Utc>,
}

/// Publish side of the change fabric.
///
/// Implementations must not block and must not fail the caller: delivery is
/// best-effort and at most once per subscriber.
pub trait ChangePublisher: Send + Sync {
    /// Hands `change` to every current subscriber.
    fn publish(&self, change: ShipmentChange);
}
