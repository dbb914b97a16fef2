//! Shared test mocks and utilities for the Shiptrack service.

mod clock;
mod publisher;
mod rng;
mod store;

pub use clock::{FixedClock, fixed_now};
pub use publisher::RecordingPublisher;
pub use rng::{MockRng, SequenceRng};
pub use store::{FailingShipmentStore, ReadOnlyShipmentStore};
