//! Status engine: pure derivations from a status or a tracking history.

use serde::Serialize;

use crate::domain::shipment::{Shipment, ShipmentStatus};
use crate::domain::tracking::{EventStatus, TrackingEvent};

/// Badge color for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorToken {
    Green,
    Blue,
    Yellow,
    Purple,
    Gray,
    /// Anything not recognized as a status.
    Neutral,
}

impl ColorToken {
    /// Utility classes for a badge in this color.
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Green => "bg-green-100 text-green-800 dark:bg-green-900/20 dark:text-green-400",
            Self::Blue => "bg-blue-100 text-blue-800 dark:bg-blue-900/20 dark:text-blue-400",
            Self::Yellow => {
                "bg-yellow-100 text-yellow-800 dark:bg-yellow-900/20 dark:text-yellow-400"
            }
            Self::Purple => {
                "bg-purple-100 text-purple-800 dark:bg-purple-900/20 dark:text-purple-400"
            }
            Self::Gray | Self::Neutral => {
                "bg-gray-100 text-gray-800 dark:bg-gray-700 dark:text-gray-300"
            }
        }
    }
}

/// Lowercases and turns spaces into underscores, so `"In Transit"` and
/// `"On_Hold"` read as their wire names.
fn normalize(status: &str) -> String {
    status.trim().to_lowercase().replace(' ', "_")
}

/// Maps any status string to a color. Total: unknown input is `Neutral`.
#[must_use]
pub fn color_class_for(status: &str) -> ColorToken {
    match normalize(status).parse::<ShipmentStatus>() {
        Ok(ShipmentStatus::Delivered) => ColorToken::Green,
        Ok(ShipmentStatus::InTransit | ShipmentStatus::OutForDelivery) => ColorToken::Blue,
        Ok(ShipmentStatus::Processing) => ColorToken::Yellow,
        Ok(ShipmentStatus::LabelCreated) => ColorToken::Purple,
        Ok(ShipmentStatus::Pending | ShipmentStatus::OnHold) => ColorToken::Gray,
        Err(_) => ColorToken::Neutral,
    }
}

/// A milestone is complete when its event is.
#[must_use]
pub fn is_milestone_complete(event: &TrackingEvent) -> bool {
    event.status == EventStatus::Completed
}

/// The milestone currently under way.
#[must_use]
pub fn is_active(event: &TrackingEvent) -> bool {
    event.status == EventStatus::InProgress
}

/// Timeline order is stored order (newest first); nothing is re-sorted,
/// even when timestamps disagree.
#[must_use]
pub fn order_timeline(history: &[TrackingEvent]) -> &[TrackingEvent] {
    history
}

/// Translation key for a status or status code, e.g. `status_in_transit`.
#[must_use]
pub fn status_label_key(code: &str) -> String {
    format!("status_{}", normalize(code))
}

/// The status a status code implies, if it names one.
#[must_use]
pub fn implied_status(status_code: &str) -> Option<ShipmentStatus> {
    normalize(status_code).parse().ok()
}

/// Whether the newest event names a status other than the shipment's.
///
/// Events whose code implies no status (e.g. `location_updated`) never
/// disagree.
#[must_use]
pub fn history_disagrees_with_status(shipment: &Shipment) -> bool {
    shipment
        .latest_event()
        .and_then(|event| implied_status(&event.status_code))
        .is_some_and(|implied| implied != shipment.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    use crate::domain::shipment::{Address, Contact};

    fn event(status: EventStatus, code: &str) -> TrackingEvent {
        TrackingEvent {
            id: None,
            status,
            status_code: code.to_owned(),
            location: "Chicago, IL".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            details: String::new(),
        }
    }

    fn shipment(status: ShipmentStatus, history: Vec<TrackingEvent>) -> Shipment {
        let day = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        Shipment {
            id: Uuid::nil(),
            tracking_number: "SHIP0000001".to_owned(),
            status,
            package_type: Default::default(),
            service_type: Default::default(),
            ship_date: day,
            estimated_delivery: day,
            sender: Contact::default(),
            receiver: Contact::default(),
            origin: Address::default(),
            destination: Address::default(),
            items: Vec::new(),
            tracking_history: history,
            created_at: None,
            updated_at: None,
            revision: 1,
        }
    }

    #[test]
    fn test_color_mapping_covers_every_status() {
        assert_eq!(color_class_for("delivered"), ColorToken::Green);
        assert_eq!(color_class_for("in_transit"), ColorToken::Blue);
        assert_eq!(color_class_for("out_for_delivery"), ColorToken::Blue);
        assert_eq!(color_class_for("processing"), ColorToken::Yellow);
        assert_eq!(color_class_for("label_created"), ColorToken::Purple);
        assert_eq!(color_class_for("pending"), ColorToken::Gray);
        assert_eq!(color_class_for("on_hold"), ColorToken::Gray);
    }

    #[test]
    fn test_color_mapping_normalizes_and_falls_back_to_neutral() {
        assert_eq!(color_class_for("On_Hold"), ColorToken::Gray);
        assert_eq!(color_class_for("In Transit"), ColorToken::Blue);
        assert_eq!(color_class_for("lost_at_sea"), ColorToken::Neutral);
        assert_eq!(color_class_for(""), ColorToken::Neutral);
        assert!(ColorToken::Neutral.css_class().contains("gray"));
    }

    #[test]
    fn test_milestone_predicates() {
        let done = event(EventStatus::Completed, "departed_facility");
        let running = event(EventStatus::InProgress, "in_transit");
        let waiting = event(EventStatus::Pending, "out_for_delivery");

        assert!(is_milestone_complete(&done));
        assert!(!is_active(&done));
        assert!(is_active(&running));
        assert!(!is_milestone_complete(&waiting));
        assert!(!is_active(&waiting));
    }

    #[test]
    fn test_order_timeline_keeps_stored_order() {
        // Arrange: the head is older than the second entry.
        let mut newer = event(EventStatus::Completed, "in_transit");
        newer.timestamp = Utc.with_ymd_and_hms(2026, 1, 16, 0, 0, 0).unwrap();
        let history = vec![event(EventStatus::Completed, "delivered"), newer];

        // Act
        let ordered = order_timeline(&history);

        // Assert
        assert_eq!(ordered, history.as_slice());
    }

    #[test]
    fn test_status_label_key() {
        assert_eq!(status_label_key("in_transit"), "status_in_transit");
        assert_eq!(status_label_key("Label Created"), "status_label_created");
    }

    #[test]
    fn test_history_divergence_detection() {
        let agrees = shipment(
            ShipmentStatus::Delivered,
            vec![event(EventStatus::Completed, "delivered")],
        );
        let disagrees = shipment(
            ShipmentStatus::Processing,
            vec![event(EventStatus::Completed, "delivered")],
        );
        let neutral = shipment(
            ShipmentStatus::Processing,
            vec![event(EventStatus::Completed, "location_updated")],
        );

        assert!(!history_disagrees_with_status(&agrees));
        assert!(history_disagrees_with_status(&disagrees));
        assert!(!history_disagrees_with_status(&neutral));
        assert!(!history_disagrees_with_status(&shipment(ShipmentStatus::Pending, Vec::new())));
    }
}
