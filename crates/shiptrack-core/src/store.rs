//! Shipment store abstraction.
//!
//! The store is an external collaborator holding one flat collection of
//! shipment documents. Documents are camelCase JSON objects; the store only
//! interprets the handful of fields it needs to address and version them.
//! Every adapter (in-memory, HTTP blob, `PostgreSQL`) satisfies the same
//! contract, so the helpers below encode the shared document rules.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{DomainError, ValidationError};

/// A raw shipment document as held by the store.
pub type Document = Map<String, Value>;

/// Document field holding the opaque identifier.
pub const ID_FIELD: &str = "id";
/// Document field holding the human-facing tracking number.
pub const TRACKING_NUMBER_FIELD: &str = "trackingNumber";
/// Document field holding the store-managed revision counter.
pub const REVISION_FIELD: &str = "revision";
/// Document field holding the newest-first tracking history.
pub const HISTORY_FIELD: &str = "trackingHistory";

/// Returns the document's identifier, if present.
#[must_use]
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// Returns the document's tracking number, if present.
#[must_use]
pub fn document_tracking_number(document: &Document) -> Option<&str> {
    document.get(TRACKING_NUMBER_FIELD).and_then(Value::as_str)
}

/// Returns the document's revision; documents written before revisions
/// existed read as revision 0.
#[must_use]
pub fn document_revision(document: &Document) -> i64 {
    document
        .get(REVISION_FIELD)
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// Finds the document addressed by `key`: a tracking-number match wins over
/// an id match.
#[must_use]
pub fn position_by_key(documents: &[Document], key: &str) -> Option<usize> {
    documents
        .iter()
        .position(|doc| document_tracking_number(doc) == Some(key))
        .or_else(|| documents.iter().position(|doc| document_id(doc) == Some(key)))
}

/// Rejects a write whose expected revision no longer matches.
///
/// # Errors
///
/// Returns `DomainError::Conflict` when `expected` is set and differs from
/// the stored revision.
pub fn check_revision(
    document: &Document,
    key: &str,
    expected: Option<i64>,
) -> Result<(), DomainError> {
    let actual = document_revision(document);
    match expected {
        Some(expected) if expected != actual => Err(DomainError::Conflict {
            key: key.to_owned(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Checks that `document` can join `existing`: it needs an id and a tracking
/// number, and neither may already be taken.
///
/// # Errors
///
/// Returns `DomainError::DuplicateTrackingNumber` on a tracking-number
/// collision and `DomainError::Conflict` on an id collision.
pub fn check_insertable(existing: &[Document], document: &Document) -> Result<(), DomainError> {
    let tracking_number = document_tracking_number(document)
        .ok_or_else(|| ValidationError::required(TRACKING_NUMBER_FIELD))?;
    let id = document_id(document).ok_or_else(|| ValidationError::required(ID_FIELD))?;

    if existing
        .iter()
        .any(|doc| document_tracking_number(doc) == Some(tracking_number))
    {
        return Err(DomainError::DuplicateTrackingNumber(tracking_number.to_owned()));
    }
    if let Some(taken) = existing.iter().find(|doc| document_id(doc) == Some(id)) {
        return Err(DomainError::Conflict {
            key: id.to_owned(),
            expected: 0,
            actual: document_revision(taken),
        });
    }
    Ok(())
}

/// Stamps the initial revision on a freshly inserted document.
pub fn stamp_inserted(document: &mut Document) {
    document.insert(REVISION_FIELD.to_owned(), Value::from(1_i64));
}

/// Shallow-merges `fields` into `document` and bumps the revision.
///
/// Top-level keys replace wholesale, including `trackingHistory`. The id,
/// tracking number and revision are store-owned and ignored if present.
pub fn merge_fields(document: &mut Document, fields: Document) {
    for (name, value) in fields {
        if name == ID_FIELD || name == TRACKING_NUMBER_FIELD || name == REVISION_FIELD {
            continue;
        }
        document.insert(name, value);
    }
    bump_revision(document);
}

/// Prepends `event` to the document's tracking history and bumps the
/// revision.
pub fn prepend_event(document: &mut Document, event: Value) {
    let history = document
        .entry(HISTORY_FIELD.to_owned())
        .or_insert_with(|| Value::Array(Vec::new()));
    match history {
        Value::Array(events) => events.insert(0, event),
        other => *other = Value::Array(vec![event]),
    }
    bump_revision(document);
}

fn bump_revision(document: &mut Document) {
    let next = document_revision(document) + 1;
    document.insert(REVISION_FIELD.to_owned(), Value::from(next));
}

/// Keyed document storage for shipments.
///
/// `key` arguments accept either a tracking number or an id, resolved with
/// [`position_by_key`] semantics.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend_tag(&self) -> &'static str;

    /// Fetches the whole collection.
    async fn fetch_all(&self) -> Result<Vec<Document>, DomainError>;

    /// Fetches one document, or `None` when the key resolves to nothing.
    async fn fetch_one(&self, key: &str) -> Result<Option<Document>, DomainError>;

    /// Inserts a complete document (id included) and returns it as stored.
    async fn insert(&self, document: Document) -> Result<Document, DomainError>;

    /// Shallow-merges `fields` into the addressed document. When
    /// `expected_revision` is set the write only applies if it still matches.
    async fn merge(
        &self,
        key: &str,
        expected_revision: Option<i64>,
        fields: Document,
    ) -> Result<Document, DomainError>;

    /// Removes the addressed document permanently.
    async fn delete(&self, key: &str) -> Result<(), DomainError>;

    /// Prepends a tracking event to the addressed document.
    async fn append_event(&self, key: &str, event: Value) -> Result<Document, DomainError>;
}
