//! Externally sourced air-quality readings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::air_quality::AirQuality;

/// A reading ingested from an external source (HTTP poll or MQTT publish).
///
/// Same NGSI-LD shape as [`AirQuality`] plus a dynamic extension map:
/// payload fields the normalizer does not recognize are preserved verbatim
/// so no upstream data is lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAirQuality {
    #[serde(flatten)]
    pub reading: AirQuality,

    /// Unrecognized payload fields, keyed by their original names. Flattened
    /// into the document so the stored entity keeps the upstream field names
    /// at the top level.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ExternalAirQuality {
    pub fn from_reading(reading: AirQuality) -> Self {
        Self {
            reading,
            extra: BTreeMap::new(),
        }
    }
}

/// Query parameters for listing external readings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExternalQuery {
    pub station_id: Option<String>,
    pub limit: Option<i64>,
}
