//! Shiptrack Store: adapters implementing `ShipmentStore`.
//!
//! Every adapter satisfies the same contract; one is chosen at startup and
//! injected into the repository.

pub mod http_blob;
pub mod memory;
pub mod pg_shipment_store;
pub mod schema;
