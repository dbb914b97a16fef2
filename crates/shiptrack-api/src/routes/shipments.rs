//! Routes for shipments.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use shiptrack_core::error::DomainError;
use shiptrack_shipments::application::query_handlers::{ShipmentQuery, ShipmentStats};
use shiptrack_shipments::domain::commands::{self, ShipmentDraft, ShipmentPatch};
use shiptrack_shipments::domain::shipment::{Shipment, ShipmentStatus};
use shiptrack_shipments::domain::tracking::NewTrackingEvent;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /{key}/status.
#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    /// Target status name, e.g. `in_transit`.
    pub status: String,
}

/// Request body for POST /{key}/location.
#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub location: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Request body for POST /bulk/status.
#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    pub keys: Vec<String>,
    pub status: String,
}

/// Request body for POST /bulk/delete.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub keys: Vec<String>,
}

/// Response body for POST /bulk/delete.
#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    /// Number of shipments removed.
    pub deleted: usize,
}

fn parse_status(raw: &str) -> Result<ShipmentStatus, ApiError> {
    raw.parse::<ShipmentStatus>()
        .map_err(|e| ApiError(DomainError::Validation(e)))
}

/// GET /
#[instrument(skip(state))]
async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentQuery>,
) -> Result<Json<Vec<Shipment>>, ApiError> {
    Ok(Json(state.repository.search(&query).await?))
}

/// POST /
#[instrument(skip(state, draft))]
async fn create_shipment(
    State(state): State<AppState>,
    Json(draft): Json<ShipmentDraft>,
) -> Result<(StatusCode, Json<Shipment>), ApiError> {
    let command = commands::CreateShipment {
        correlation_id: Uuid::new_v4(),
        draft,
    };

    info!(correlation_id = %command.correlation_id, "handling create_shipment command");

    let shipment = state.repository.create_shipment(&command).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

/// GET /stats
#[instrument(skip(state))]
async fn shipment_stats(State(state): State<AppState>) -> Result<Json<ShipmentStats>, ApiError> {
    Ok(Json(state.repository.dashboard_stats().await?))
}

/// GET /{key}
#[instrument(skip(state))]
async fn get_shipment(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Shipment>, ApiError> {
    Ok(Json(state.repository.get_shipment(&key).await?))
}

/// PATCH /{key}
#[instrument(skip(state, patch))]
async fn update_shipment(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(patch): Json<ShipmentPatch>,
) -> Result<Json<Shipment>, ApiError> {
    let command = commands::UpdateShipment {
        correlation_id: Uuid::new_v4(),
        key,
        patch,
    };

    info!(correlation_id = %command.correlation_id, "handling update_shipment command");

    Ok(Json(state.repository.update_shipment(&command).await?))
}

/// DELETE /{key}
#[instrument(skip(state))]
async fn delete_shipment(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let command = commands::DeleteShipment {
        correlation_id: Uuid::new_v4(),
        key,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_shipment command");

    state.repository.delete_shipment(&command).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /{key}/status
#[instrument(skip(state, request), fields(status = %request.status))]
async fn change_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<Json<Shipment>, ApiError> {
    let command = commands::ChangeStatus {
        correlation_id: Uuid::new_v4(),
        key,
        status: parse_status(&request.status)?,
    };

    info!(correlation_id = %command.correlation_id, "handling change_status command");

    Ok(Json(state.repository.change_status(&command).await?))
}

/// POST /{key}/events
#[instrument(skip(state, event), fields(status_code = %event.status_code))]
async fn add_tracking_event(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(event): Json<NewTrackingEvent>,
) -> Result<(StatusCode, Json<Shipment>), ApiError> {
    let command = commands::AddTrackingEvent {
        correlation_id: Uuid::new_v4(),
        key,
        event,
    };

    info!(correlation_id = %command.correlation_id, "handling add_tracking_event command");

    let shipment = state.repository.add_tracking_event(&command).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

/// POST /{key}/location
#[instrument(skip(state, request), fields(location = %request.location))]
async fn update_location(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<Shipment>, ApiError> {
    let command = commands::UpdateLocation {
        correlation_id: Uuid::new_v4(),
        key,
        location: request.location,
        details: request.details,
    };

    info!(correlation_id = %command.correlation_id, "handling update_location command");

    Ok(Json(state.repository.update_location(&command).await?))
}

/// POST /bulk/status
#[instrument(skip(state, request), fields(count = request.keys.len(), status = %request.status))]
async fn bulk_change_status(
    State(state): State<AppState>,
    Json(request): Json<BulkStatusRequest>,
) -> Result<Json<Vec<Shipment>>, ApiError> {
    let command = commands::BulkChangeStatus {
        correlation_id: Uuid::new_v4(),
        status: parse_status(&request.status)?,
        keys: request.keys,
    };

    info!(correlation_id = %command.correlation_id, "handling bulk_change_status command");

    Ok(Json(state.repository.bulk_change_status(&command).await?))
}

/// POST /bulk/delete
#[instrument(skip(state, request), fields(count = request.keys.len()))]
async fn bulk_delete(
    State(state): State<AppState>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    let command = commands::BulkDelete {
        correlation_id: Uuid::new_v4(),
        keys: request.keys,
    };

    info!(correlation_id = %command.correlation_id, "handling bulk_delete command");

    let deleted = state.repository.bulk_delete(&command).await?;
    Ok(Json(BulkDeleteResponse { deleted }))
}

/// Returns the router for shipments.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_shipments).post(create_shipment))
        .route("/stats", get(shipment_stats))
        .route("/bulk/status", post(bulk_change_status))
        .route("/bulk/delete", post(bulk_delete))
        .route(
            "/{key}",
            get(get_shipment)
                .patch(update_shipment)
                .delete(delete_shipment),
        )
        .route("/{key}/status", post(change_status))
        .route("/{key}/events", post(add_tracking_event))
        .route("/{key}/location", post(update_location))
}
