//! Demo data loaded into an empty store at startup.
//!
//! A seed file is a YAML list of shipment drafts; each entry may carry the
//! tracking history it should start with (newest first).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::commands::ShipmentDraft;
use crate::domain::tracking::NewTrackingEvent;

/// One demo shipment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedShipment {
    #[serde(flatten)]
    pub draft: ShipmentDraft,
    /// Replaces the generated creation event when non-empty.
    #[serde(default)]
    pub tracking_history: Vec<NewTrackingEvent>,
}

/// Failure to read a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The file could not be read.
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The file is not a YAML list of shipments.
    #[error("invalid seed file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Parses seed shipments from YAML text.
///
/// # Errors
///
/// Returns `serde_yaml::Error` if the text is not a list of shipments.
pub fn parse_seed(yaml: &str) -> Result<Vec<SeedShipment>, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

/// Reads and parses a seed file.
///
/// # Errors
///
/// Returns `SeedError` if the file is unreadable or malformed.
pub fn load_seed_file(path: &Path) -> Result<Vec<SeedShipment>, SeedError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: display.clone(),
        source,
    })?;
    parse_seed(&text).map_err(|source| SeedError::Parse {
        path: display,
        source,
    })
}
