//! The shipment aggregate and its value types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shiptrack_core::error::{ValidationError, ValidationReason};
use shiptrack_core::rng::DeterministicRng;
use uuid::Uuid;

use crate::domain::commands::ShipmentDraft;
use crate::domain::tracking::{EventStatus, TrackingEvent, status_codes};
use crate::domain::validation;

/// Prefix of every tracking number.
pub const TRACKING_NUMBER_PREFIX: &str = "SHIP";
/// Number of digits following the prefix.
pub const TRACKING_NUMBER_DIGITS: usize = 7;

/// Lifecycle status of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Registered, nothing has happened yet.
    Pending,
    /// A shipping label exists.
    LabelCreated,
    /// Being prepared at the origin facility.
    Processing,
    /// Moving between facilities.
    InTransit,
    /// On the vehicle for final delivery.
    OutForDelivery,
    /// Handed to the receiver.
    Delivered,
    /// Held back (customs, address problem, request).
    OnHold,
}

impl ShipmentStatus {
    /// Every status, in workflow order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::LabelCreated,
        Self::Processing,
        Self::InTransit,
        Self::OutForDelivery,
        Self::Delivered,
        Self::OnHold,
    ];

    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::LabelCreated => "label_created",
            Self::Processing => "processing",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::OnHold => "on_hold",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::new("status", ValidationReason::BadFormat))
    }
}

/// Kind of parcel being shipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    /// Standard box.
    #[default]
    Package,
    /// Envelope or flat document.
    Document,
    /// Palletized freight.
    Pallet,
    /// Oversize item.
    Oversize,
}

/// Delivery speed purchased for the shipment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    #[default]
    Standard,
    Express,
    Overnight,
    International,
}

/// Unit of a declared item weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lb,
    G,
    Oz,
}

/// Sender or receiver contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// Postal address of an origin or destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl Address {
    /// `"city, country"`, the form used for event locations.
    #[must_use]
    pub fn city_and_country(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

/// One declared line of the shipment's contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageItem {
    pub description: String,
    pub quantity: i64,
    pub weight: f64,
    pub weight_unit: WeightUnit,
    /// Free-form, e.g. `"30 x 20 x 10 cm"`.
    pub dimensions: String,
}

/// A shipment as stored and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    /// Opaque identifier, assigned once at creation and never reused.
    pub id: Uuid,
    /// `SHIP` followed by seven digits; immutable after creation.
    pub tracking_number: String,
    /// Authoritative lifecycle status.
    pub status: ShipmentStatus,
    #[serde(default)]
    pub package_type: PackageType,
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(with = "calendar_date")]
    pub ship_date: NaiveDate,
    #[serde(with = "calendar_date")]
    pub estimated_delivery: NaiveDate,
    pub sender: Contact,
    pub receiver: Contact,
    pub origin: Address,
    pub destination: Address,
    pub items: Vec<PackageItem>,
    /// Newest event first.
    #[serde(default)]
    pub tracking_history: Vec<TrackingEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Store-managed write counter.
    #[serde(default)]
    pub revision: i64,
}

impl Shipment {
    /// Builds a new shipment from a draft, seeding its history with the
    /// creation event located at the origin.
    ///
    /// `tracking_number` is the number to use when the draft carries none.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found in the draft.
    pub fn create(
        draft: ShipmentDraft,
        id: Uuid,
        tracking_number: String,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        validation::validate_draft(&draft)?;
        let ship_date = draft
            .ship_date
            .ok_or_else(|| ValidationError::required("shipDate"))?;
        let estimated_delivery = draft
            .estimated_delivery
            .ok_or_else(|| ValidationError::required("estimatedDelivery"))?;

        let creation_event = TrackingEvent {
            id: Some(Uuid::now_v7()),
            status: EventStatus::Completed,
            status_code: status_codes::SHIPMENT_CREATED.to_owned(),
            location: draft.origin.city_and_country(),
            timestamp: now,
            details: "Shipment created".to_owned(),
        };

        Ok(Self {
            id,
            tracking_number: draft
                .tracking_number
                .filter(|given| !given.trim().is_empty())
                .unwrap_or(tracking_number),
            status: draft.status.unwrap_or(ShipmentStatus::Pending),
            package_type: draft.package_type.unwrap_or_default(),
            service_type: draft.service_type.unwrap_or_default(),
            ship_date,
            estimated_delivery,
            sender: draft.sender,
            receiver: draft.receiver,
            origin: draft.origin,
            destination: draft.destination,
            items: draft.items,
            tracking_history: vec![creation_event],
            created_at: Some(now),
            updated_at: Some(now),
            revision: 0,
        })
    }

    /// The newest tracking event, if any.
    #[must_use]
    pub fn latest_event(&self) -> Option<&TrackingEvent> {
        self.tracking_history.first()
    }

    /// Where the shipment was last seen: the newest event's location, or
    /// the origin when there is no located event.
    #[must_use]
    pub fn last_known_location(&self) -> String {
        self.latest_event()
            .map(|event| event.location.as_str())
            .filter(|location| !location.trim().is_empty())
            .map_or_else(|| self.origin.city_and_country(), str::to_owned)
    }
}

/// Draws a candidate tracking number: the prefix followed by seven
/// zero-padded random digits.
pub fn generate_tracking_number(rng: &mut dyn DeterministicRng) -> String {
    let digits = rng.next_u32_range(0, 9_999_999);
    format!("{TRACKING_NUMBER_PREFIX}{digits:0width$}", width = TRACKING_NUMBER_DIGITS)
}

/// Parses a calendar date given either as `YYYY-MM-DD` or as an RFC 3339
/// instant (whose UTC date is taken).
#[must_use]
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|instant| instant.with_timezone(&Utc).date_naive())
    })
}

/// Serde adapter for `NaiveDate` fields: writes `YYYY-MM-DD`, reads either
/// form accepted by [`parse_calendar_date`].
pub mod calendar_date {
    use chrono::NaiveDate;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_calendar_date(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid calendar date: {raw}")))
    }

    /// Same as the parent module, for optional fields.
    pub mod option {
        use chrono::NaiveDate;
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.collect_str(&date.format("%Y-%m-%d")),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.filter(|raw| !raw.trim().is_empty())
                .map(|raw| {
                    super::super::parse_calendar_date(&raw)
                        .ok_or_else(|| D::Error::custom(format!("invalid calendar date: {raw}")))
                })
                .transpose()
        }
    }
}
