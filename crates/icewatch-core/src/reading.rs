//! Immutable sensor reading and its wire representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped snapshot of a sensor's four measured parameters.
///
/// Produced fresh each tick from [`Sensor`](crate::Sensor) state and never
/// mutated afterwards. Serializes to the ingestion wire format: camelCase
/// field names and an ISO-8601 UTC timestamp with sub-second precision and
/// a `Z` suffix. Numeric fields carry full floating-point precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Ingestion-endpoint device identity.
    pub device_id: String,
    /// Human-readable location name.
    pub location: String,
    /// Instant the reading was produced.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Ice thickness in centimetres.
    pub ice_thickness: f64,
    /// Ice surface temperature in degrees Celsius.
    pub surface_temp: f64,
    /// Snow accumulation in centimetres.
    pub snow_accumulation: f64,
    /// Ambient air temperature in degrees Celsius.
    pub external_temp: f64,
}

/// Serde codec for the wire timestamp: RFC 3339, UTC, microsecond
/// precision, `Z` suffix (chrono's default offset rendering is `+00:00`,
/// which the endpoint does not accept).
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
