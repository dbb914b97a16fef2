//! Shiptrack Core: shared domain abstractions.
//!
//! This crate defines the traits and types that the shipment context, the
//! store adapters and the API depend on. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod notify;
pub mod rng;
pub mod store;
