//! Shiptrack Shipments: the shipment model, its status workflow and
//! tracking history, and the repository that keeps a local view in sync
//! with the shipment store.

pub mod domain {
    pub mod commands;
    pub mod shipment;
    pub mod status;
    pub mod tracking;
    pub mod validation;
}

pub mod application {
    pub mod notifications;
    pub mod query_handlers;
    pub mod repository;
    pub mod seed;
}
