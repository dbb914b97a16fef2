//! Commands for the shipment context.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shiptrack_core::command::Command;
use shiptrack_core::store::{Document, ID_FIELD, TRACKING_NUMBER_FIELD};
use uuid::Uuid;

use crate::domain::shipment::{
    Address, Contact, PackageItem, PackageType, ServiceType, ShipmentStatus, calendar_date,
};
use crate::domain::tracking::{NewTrackingEvent, TrackingEvent};

/// Input for creating a shipment. Every field is optional on the wire so
/// that missing values surface as validation errors naming the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShipmentDraft {
    /// Generated when absent.
    pub tracking_number: Option<String>,
    /// Defaults to `pending`.
    pub status: Option<ShipmentStatus>,
    pub package_type: Option<PackageType>,
    pub service_type: Option<ServiceType>,
    #[serde(with = "calendar_date::option")]
    pub ship_date: Option<NaiveDate>,
    #[serde(with = "calendar_date::option")]
    pub estimated_delivery: Option<NaiveDate>,
    pub sender: Contact,
    pub receiver: Contact,
    pub origin: Address,
    pub destination: Address,
    pub items: Vec<PackageItem>,
}

/// A partial update. Only provided fields are written; a provided
/// `trackingHistory` replaces the stored array wholesale.
///
/// `id` and `trackingNumber` are accepted so that clients may echo the
/// whole document back, but they must match the stored values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShipmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ShipmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_type: Option<PackageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
    #[serde(
        with = "calendar_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ship_date: Option<NaiveDate>,
    #[serde(
        with = "calendar_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_delivery: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<PackageItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_history: Option<Vec<TrackingEvent>>,
}

impl ShipmentPatch {
    /// Whether the patch carries no writable field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_fields().is_empty()
    }

    /// The writable fields as a store document, immutable keys removed.
    #[must_use]
    pub fn to_fields(&self) -> Document {
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Document::new(),
        };
        fields.remove(ID_FIELD);
        fields.remove(TRACKING_NUMBER_FIELD);
        fields
    }
}

/// Command to create a shipment.
#[derive(Debug, Clone)]
pub struct CreateShipment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The shipment to create.
    pub draft: ShipmentDraft,
}

/// Command to apply a partial update.
#[derive(Debug, Clone)]
pub struct UpdateShipment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Tracking number or id.
    pub key: String,
    /// Fields to write.
    pub patch: ShipmentPatch,
}

/// Command to delete a shipment permanently.
#[derive(Debug, Clone)]
pub struct DeleteShipment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Tracking number or id.
    pub key: String,
}

/// Command to move a shipment to a new status.
#[derive(Debug, Clone)]
pub struct ChangeStatus {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Tracking number or id.
    pub key: String,
    /// The new status.
    pub status: ShipmentStatus,
}

/// Command to append a tracking event.
#[derive(Debug, Clone)]
pub struct AddTrackingEvent {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Tracking number or id.
    pub key: String,
    /// The event to append.
    pub event: NewTrackingEvent,
}

/// Command to record a new location.
#[derive(Debug, Clone)]
pub struct UpdateLocation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Tracking number or id.
    pub key: String,
    /// Where the shipment is now.
    pub location: String,
    /// Free text; defaults to "Location updated to {location}".
    pub details: Option<String>,
}

/// Command to move several shipments to one status.
#[derive(Debug, Clone)]
pub struct BulkChangeStatus {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Tracking numbers or ids, processed in order.
    pub keys: Vec<String>,
    /// The new status.
    pub status: ShipmentStatus,
}

/// Command to delete several shipments.
#[derive(Debug, Clone)]
pub struct BulkDelete {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Tracking numbers or ids, processed in order.
    pub keys: Vec<String>,
}

macro_rules! impl_command {
    ($($ty:ident => $name:literal),+ $(,)?) => {
        $(
            impl Command for $ty {
                fn command_type(&self) -> &'static str {
                    $name
                }

                fn correlation_id(&self) -> Uuid {
                    self.correlation_id
                }
            }
        )+
    };
}

impl_command! {
    CreateShipment => "shipments.create_shipment",
    UpdateShipment => "shipments.update_shipment",
    DeleteShipment => "shipments.delete_shipment",
    ChangeStatus => "shipments.change_status",
    AddTrackingEvent => "shipments.add_tracking_event",
    UpdateLocation => "shipments.update_location",
    BulkChangeStatus => "shipments.bulk_change_status",
    BulkDelete => "shipments.bulk_delete",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_fields_contain_only_provided_values() {
        // Arrange
        let patch = ShipmentPatch {
            id: Some(Uuid::nil()),
            tracking_number: Some("SHIP0000001".to_owned()),
            status: Some(ShipmentStatus::OnHold),
            estimated_delivery: NaiveDate::from_ymd_opt(2026, 2, 1),
            ..ShipmentPatch::default()
        };

        // Act
        let fields = patch.to_fields();

        // Assert
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["status"], "on_hold");
        assert_eq!(fields["estimatedDelivery"], "2026-02-01");
    }

    #[test]
    fn test_patch_with_only_identifiers_is_empty() {
        let patch = ShipmentPatch {
            tracking_number: Some("SHIP0000001".to_owned()),
            ..ShipmentPatch::default()
        };
        assert!(patch.is_empty());
        assert!(ShipmentPatch::default().is_empty());
    }

    #[test]
    fn test_draft_deserializes_partial_input() {
        let json = serde_json::json!({
            "shipDate": "2026-01-15T00:00:00.000Z",
            "sender": {"name": "John Smith"},
            "items": [{"description": "Books", "quantity": 2}]
        });

        let draft: ShipmentDraft = serde_json::from_value(json).unwrap();

        assert_eq!(draft.ship_date, NaiveDate::from_ymd_opt(2026, 1, 15));
        assert_eq!(draft.estimated_delivery, None);
        assert_eq!(draft.sender.name, "John Smith");
        assert_eq!(draft.receiver, Contact::default());
        assert_eq!(draft.items[0].quantity, 2);
    }

    #[test]
    fn test_command_type_names() {
        let command = ChangeStatus {
            correlation_id: Uuid::nil(),
            key: "SHIP0000001".to_owned(),
            status: ShipmentStatus::Delivered,
        };
        assert_eq!(command.command_type(), "shipments.change_status");
        assert_eq!(command.correlation_id(), Uuid::nil());
    }
}
