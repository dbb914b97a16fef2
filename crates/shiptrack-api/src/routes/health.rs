//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when the store answered, `degraded` otherwise.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Which store adapter is in use.
    pub store: &'static str,
    /// Live change subscribers.
    pub subscribers: usize,
}

/// GET /health
///
/// Responds 503 when the store cannot be reached.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = state.repository.health_check().await;
    let (code, status) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            store: state.repository.backend_tag(),
            subscribers: state.bus.subscriber_count(),
        }),
    )
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
