//! Test publisher: records every change notification.

use std::sync::Mutex;

use shiptrack_core::notify::{ChangeKind, ChangePublisher, ShipmentChange};

/// A publisher that keeps every published change in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<ShipmentChange>>,
}

impl RecordingPublisher {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all published changes, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<ShipmentChange> {
        self.published.lock().unwrap().clone()
    }

    /// Returns the kinds of all published changes, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|change| change.kind)
            .collect()
    }
}

impl ChangePublisher for RecordingPublisher {
    fn publish(&self, change: ShipmentChange) {
        self.published.lock().unwrap().push(change);
    }
}
