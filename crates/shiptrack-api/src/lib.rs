//! Shiptrack API: HTTP surface over the shipment repository.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router. CORS is permissive so any
/// dashboard origin can reach the API.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/shipments", routes::shipments::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
