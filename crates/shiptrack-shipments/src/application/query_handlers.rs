//! Read-side helpers: search, sort and dashboard totals over a shipment
//! listing. All functions are pure; the repository feeds them its fresh
//! listing.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::shipment::{Shipment, ShipmentStatus};
use crate::domain::status::history_disagrees_with_status;

/// Field a listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    TrackingNumber,
    Status,
    ShipDate,
    EstimatedDelivery,
    #[serde(rename = "receiver.name", alias = "receiverName")]
    ReceiverName,
    #[serde(rename = "destination.city", alias = "destinationCity")]
    DestinationCity,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Search parameters. The default matches everything, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipmentQuery {
    /// Case-insensitive substring of the tracking number, receiver name or
    /// destination city.
    pub q: Option<String>,
    /// Only shipments in this status.
    pub status: Option<ShipmentStatus>,
    pub sort: SortField,
    pub direction: SortDirection,
}

impl ShipmentQuery {
    fn matches(&self, shipment: &Shipment) -> bool {
        if self.status.is_some_and(|status| status != shipment.status) {
            return false;
        }
        let Some(needle) = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
        else {
            return true;
        };
        let needle = needle.to_lowercase();
        [
            shipment.tracking_number.as_str(),
            shipment.receiver.name.as_str(),
            shipment.destination.city.as_str(),
        ]
        .iter()
        .any(|haystack| haystack.to_lowercase().contains(&needle))
    }
}

fn compare(field: SortField, a: &Shipment, b: &Shipment) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::TrackingNumber => a.tracking_number.cmp(&b.tracking_number),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        SortField::ShipDate => a.ship_date.cmp(&b.ship_date),
        SortField::EstimatedDelivery => a.estimated_delivery.cmp(&b.estimated_delivery),
        SortField::ReceiverName => a
            .receiver
            .name
            .to_lowercase()
            .cmp(&b.receiver.name.to_lowercase()),
        SortField::DestinationCity => a
            .destination
            .city
            .to_lowercase()
            .cmp(&b.destination.city.to_lowercase()),
    }
}

/// Filters and orders `shipments` per `query`. The sort is stable, so ties
/// keep the store's order.
#[must_use]
pub fn filter_shipments(shipments: Vec<Shipment>, query: &ShipmentQuery) -> Vec<Shipment> {
    let mut matched: Vec<Shipment> = shipments
        .into_iter()
        .filter(|shipment| query.matches(shipment))
        .collect();
    matched.sort_by(|a, b| {
        let ordering = compare(query.sort, a, b);
        match query.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    matched
}

/// Dashboard totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentStats {
    pub total: usize,
    /// Every status is present, zero when unused.
    pub by_status: BTreeMap<ShipmentStatus, usize>,
    /// Shipments whose newest event names a different status.
    pub divergent: usize,
}

/// Counts `shipments` per status.
#[must_use]
pub fn summarize(shipments: &[Shipment]) -> ShipmentStats {
    let mut by_status: BTreeMap<ShipmentStatus, usize> = ShipmentStatus::ALL
        .into_iter()
        .map(|status| (status, 0))
        .collect();
    for shipment in shipments {
        *by_status.entry(shipment.status).or_default() += 1;
    }
    ShipmentStats {
        total: shipments.len(),
        by_status,
        divergent: shipments
            .iter()
            .filter(|shipment| history_disagrees_with_status(shipment))
            .count(),
    }
}
