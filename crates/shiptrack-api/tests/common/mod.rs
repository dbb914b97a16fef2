//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use shiptrack_core::store::ShipmentStore;
use shiptrack_shipments::application::notifications::BroadcastChangeBus;
use shiptrack_shipments::application::repository::ShipmentRepository;
use shiptrack_store::memory::InMemoryShipmentStore;
use shiptrack_test_support::{FixedClock, SequenceRng, fixed_now};
use tower::ServiceExt;

use shiptrack_api::build_router;
use shiptrack_api::state::AppState;

/// Build the full app router over an empty in-memory store with a fixed
/// clock. Uses the same router as `main.rs`.
pub fn build_test_app() -> (Router, BroadcastChangeBus) {
    build_test_app_with(
        Arc::new(InMemoryShipmentStore::new()),
        SequenceRng::new(vec![1, 2, 3, 4, 5, 6, 7, 8]),
    )
}

/// Build the full app router over `store`, drawing generated tracking
/// numbers from `rng`.
pub fn build_test_app_with(
    store: Arc<dyn ShipmentStore>,
    rng: SequenceRng,
) -> (Router, BroadcastChangeBus) {
    let bus = BroadcastChangeBus::new(64);
    let repository = ShipmentRepository::new(
        store,
        Arc::new(bus.clone()),
        Arc::new(FixedClock(fixed_now())),
        Box::new(rng),
    );
    let app = build_router(AppState::new(Arc::new(repository), bus.clone()));
    (app, bus)
}

/// A valid create body for `tracking_number`.
pub fn shipment_body(tracking_number: &str) -> serde_json::Value {
    serde_json::json!({
        "trackingNumber": tracking_number,
        "serviceType": "express",
        "shipDate": "2026-01-15",
        "estimatedDelivery": "2026-01-18",
        "sender": { "name": "John Smith", "email": "john.smith@example.com" },
        "receiver": { "name": "Sarah Johnson" },
        "origin": {
            "address": "123 Main St", "city": "New York", "state": "NY",
            "zip": "10001", "country": "USA"
        },
        "destination": {
            "address": "456 Market St", "city": "San Francisco", "state": "CA",
            "zip": "94103", "country": "USA"
        },
        "items": [{ "description": "Electronics", "quantity": 1, "weight": 2.5 }]
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("POST", uri, body)).await
}

/// Send a PATCH request with a JSON body and return the response.
pub async fn patch_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("PATCH", uri, body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}
