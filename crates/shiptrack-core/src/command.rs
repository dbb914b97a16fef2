//! Command abstractions.

use uuid::Uuid;

/// Trait that all shipment commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the store and the
    /// change notifications it produces.
    fn correlation_id(&self) -> Uuid;
}
