//! Shared application state.

use std::sync::Arc;

use shiptrack_shipments::application::notifications::BroadcastChangeBus;
use shiptrack_shipments::application::repository::ShipmentRepository;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Keyed access to shipments.
    pub repository: Arc<ShipmentRepository>,
    /// The bus the repository publishes changes on.
    pub bus: BroadcastChangeBus,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(repository: Arc<ShipmentRepository>, bus: BroadcastChangeBus) -> Self {
        Self { repository, bus }
    }
}
