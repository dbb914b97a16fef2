//! Domain error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Why an input field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    /// The field is missing or blank.
    Required,
    /// The field is present but has too few elements.
    TooShort,
    /// A numeric or date value is outside its allowed range.
    OutOfRange,
    /// The value does not match the expected format.
    BadFormat,
}

impl ValidationReason {
    /// Returns the wire name of the reason code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::TooShort => "too_short",
            Self::OutOfRange => "out_of_range",
            Self::BadFormat => "bad_format",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected input field, addressed by its path (e.g. `items[0].quantity`).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Reason code.
    pub reason: ValidationReason,
}

impl ValidationError {
    /// Creates a validation error for `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: ValidationReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }

    /// Shorthand for a `required` violation.
    #[must_use]
    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, ValidationReason::Required)
    }
}

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Bad input shape or value. Never sent to the store.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Another shipment already uses this tracking number.
    #[error("shipment with tracking number {0} already exists")]
    DuplicateTrackingNumber(String),

    /// The key resolves to neither a tracking number nor an id.
    #[error("shipment not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on shipment {key}: expected revision {expected}, found {actual}")]
    Conflict {
        /// The key the write addressed.
        key: String,
        /// The revision the writer last read.
        expected: i64,
        /// The revision currently stored.
        actual: i64,
    },

    /// Transport or backend failure.
    #[error("shipment store unavailable: {0}")]
    StoreUnavailable(String),
}
