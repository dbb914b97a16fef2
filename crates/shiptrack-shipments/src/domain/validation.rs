//! Input validation. Every check returns the first violation found, with
//! the field addressed by its camelCase path.

use chrono::NaiveDate;
use shiptrack_core::error::{ValidationError, ValidationReason};

use crate::domain::commands::{ShipmentDraft, ShipmentPatch};
use crate::domain::shipment::{
    Address, Contact, PackageItem, TRACKING_NUMBER_DIGITS, TRACKING_NUMBER_PREFIX,
};
use crate::domain::tracking::NewTrackingEvent;

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Checks the `SHIP` + seven digits format.
///
/// # Errors
///
/// `required` when blank, `bad_format` otherwise.
pub fn validate_tracking_number(tracking_number: &str) -> Result<(), ValidationError> {
    const FIELD: &str = "trackingNumber";
    if is_blank(tracking_number) {
        return Err(ValidationError::required(FIELD));
    }
    let well_formed = tracking_number
        .strip_prefix(TRACKING_NUMBER_PREFIX)
        .is_some_and(|digits| {
            digits.len() == TRACKING_NUMBER_DIGITS && digits.bytes().all(|b| b.is_ascii_digit())
        });
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new(FIELD, ValidationReason::BadFormat))
    }
}

/// Checks a sender or receiver: the name is required, an email if given
/// must look like one.
///
/// # Errors
///
/// Returns the first violation under `{prefix}.name` or `{prefix}.email`.
pub fn validate_contact(prefix: &str, contact: &Contact) -> Result<(), ValidationError> {
    if is_blank(&contact.name) {
        return Err(ValidationError::required(format!("{prefix}.name")));
    }
    let email = contact.email.trim();
    if !email.is_empty() {
        let plausible = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !plausible {
            return Err(ValidationError::new(
                format!("{prefix}.email"),
                ValidationReason::BadFormat,
            ));
        }
    }
    Ok(())
}

/// Checks that every address line is present.
///
/// # Errors
///
/// `required` on the first blank line.
pub fn validate_address(prefix: &str, address: &Address) -> Result<(), ValidationError> {
    let lines = [
        ("address", &address.address),
        ("city", &address.city),
        ("state", &address.state),
        ("zip", &address.zip),
        ("country", &address.country),
    ];
    match lines.into_iter().find(|(_, value)| is_blank(value)) {
        Some((name, _)) => Err(ValidationError::required(format!("{prefix}.{name}"))),
        None => Ok(()),
    }
}

/// Checks the item list: at least one item, each with a description, a
/// quantity of at least one and a finite, non-negative weight.
///
/// # Errors
///
/// `too_short` for an empty list, otherwise the first item violation.
pub fn validate_items(items: &[PackageItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new("items", ValidationReason::TooShort));
    }
    for (index, item) in items.iter().enumerate() {
        if is_blank(&item.description) {
            return Err(ValidationError::required(format!("items[{index}].description")));
        }
        if item.quantity < 1 {
            return Err(ValidationError::new(
                format!("items[{index}].quantity"),
                ValidationReason::OutOfRange,
            ));
        }
        if !item.weight.is_finite() || item.weight < 0.0 {
            return Err(ValidationError::new(
                format!("items[{index}].weight"),
                ValidationReason::OutOfRange,
            ));
        }
    }
    Ok(())
}

/// Checks that delivery is not estimated before the ship date.
///
/// # Errors
///
/// `out_of_range` on `estimatedDelivery`.
pub fn validate_dates(
    ship_date: NaiveDate,
    estimated_delivery: NaiveDate,
) -> Result<(), ValidationError> {
    if estimated_delivery < ship_date {
        return Err(ValidationError::new(
            "estimatedDelivery",
            ValidationReason::OutOfRange,
        ));
    }
    Ok(())
}

/// Checks a creation draft.
///
/// # Errors
///
/// Returns the first violation, checking the tracking number, parties,
/// addresses, dates and items in that order.
pub fn validate_draft(draft: &ShipmentDraft) -> Result<(), ValidationError> {
    if let Some(tracking_number) = draft.tracking_number.as_deref()
        && !is_blank(tracking_number)
    {
        validate_tracking_number(tracking_number)?;
    }
    validate_contact("sender", &draft.sender)?;
    validate_contact("receiver", &draft.receiver)?;
    validate_address("origin", &draft.origin)?;
    validate_address("destination", &draft.destination)?;
    let ship_date = draft
        .ship_date
        .ok_or_else(|| ValidationError::required("shipDate"))?;
    let estimated_delivery = draft
        .estimated_delivery
        .ok_or_else(|| ValidationError::required("estimatedDelivery"))?;
    validate_dates(ship_date, estimated_delivery)?;
    validate_items(&draft.items)
}

/// Checks the nested records a patch provides. The date ordering is a
/// creation-time rule and is not re-checked here.
///
/// # Errors
///
/// Returns the first violation among the provided fields.
pub fn validate_patch(patch: &ShipmentPatch) -> Result<(), ValidationError> {
    if let Some(sender) = &patch.sender {
        validate_contact("sender", sender)?;
    }
    if let Some(receiver) = &patch.receiver {
        validate_contact("receiver", receiver)?;
    }
    if let Some(origin) = &patch.origin {
        validate_address("origin", origin)?;
    }
    if let Some(destination) = &patch.destination {
        validate_address("destination", destination)?;
    }
    if let Some(items) = &patch.items {
        validate_items(items)?;
    }
    Ok(())
}

/// Checks a submitted tracking event: the status and a snake_case status
/// code are required.
///
/// # Errors
///
/// `required` for a missing status or code, `bad_format` for a code that
/// is not snake_case.
pub fn validate_event(event: &NewTrackingEvent) -> Result<(), ValidationError> {
    if event.status.is_none() {
        return Err(ValidationError::required("status"));
    }
    if is_blank(&event.status_code) {
        return Err(ValidationError::required("statusCode"));
    }
    let snake_case = event
        .status_code
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if !snake_case {
        return Err(ValidationError::new("statusCode", ValidationReason::BadFormat));
    }
    Ok(())
}
