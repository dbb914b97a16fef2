//! Shiptrack API: error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shiptrack_core::error::DomainError;
use shiptrack_shipments::application::seed::SeedError;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The shipment store could not be prepared or seeded.
    #[error("store error: {0}")]
    Store(#[from] DomainError),

    /// The seed file could not be loaded.
    #[error(transparent)]
    Seed(#[from] SeedError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Offending field path, for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Reason code, for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::DuplicateTrackingNumber(_) => {
                (StatusCode::CONFLICT, "duplicate_tracking_number")
            }
            DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            DomainError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            DomainError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
            }
        };

        let (field, reason) = match &self.0 {
            DomainError::Validation(err) => (Some(err.field.clone()), Some(err.reason.as_str())),
            _ => (None, None),
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
            field,
            reason,
        };

        (status, Json(body)).into_response()
    }
}
