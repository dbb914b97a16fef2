//! In-process change bus.
//!
//! Fans each `ShipmentChange` out to every live subscriber over a tokio
//! broadcast channel. Publishing never blocks and never fails: with no
//! subscribers the change is dropped, and a subscriber that falls more
//! than `capacity` changes behind skips the oldest ones.

use shiptrack_core::notify::{ChangePublisher, ShipmentChange};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of changes buffered per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast-backed `ChangePublisher`.
#[derive(Debug, Clone)]
pub struct BroadcastChangeBus {
    sender: broadcast::Sender<ShipmentChange>,
}

impl BroadcastChangeBus {
    /// Creates a bus buffering up to `capacity` changes per subscriber.
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a subscriber that sees every change published from now on.
    #[must_use]
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChangePublisher for BroadcastChangeBus {
    fn publish(&self, change: ShipmentChange) {
        let kind = change.kind.as_str();
        match self.sender.send(change) {
            Ok(receivers) => debug!(kind, receivers, "change published"),
            Err(_) => debug!(kind, "change dropped, no subscribers"),
        }
    }
}

/// Receiving end of a [`BroadcastChangeBus`].
#[derive(Debug)]
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ShipmentChange>,
}

impl ChangeSubscription {
    /// Waits for the next change. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ShipmentChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change subscriber lagged, refetch advised");
                }
            }
        }
    }

    /// Returns the next buffered change without waiting.
    pub fn try_recv(&mut self) -> Option<ShipmentChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "change subscriber lagged, refetch advised");
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}
