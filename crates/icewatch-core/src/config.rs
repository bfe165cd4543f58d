//! Fleet and run configuration types.
//!
//! Credential loading itself (environment variables, CLI flags) lives in the
//! binary; this module owns the types, the canonical fleet table, and the
//! connection-string parser, so configuration failures are strongly typed
//! and name the sensor they belong to.

use std::time::Duration;

use thiserror::Error;

/// Default interval between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Default run duration.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30 * 60);

/// Grace period granted to in-flight publishes after cancellation.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// One entry in the canonical fleet table: a stable key plus the identity
/// registered at the ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetEntry {
    /// Stable lowercase key, also the stem of the credential env var.
    pub key: &'static str,
    /// Device identity registered at the ingestion endpoint.
    pub device_id: &'static str,
    /// Human-readable location name.
    pub location: &'static str,
}

/// The three monitored locations along the skateway.
pub const DEFAULT_FLEET: [FleetEntry; 3] = [
    FleetEntry { key: "dows-lake", device_id: "dows-lake-sensor", location: "Dow's Lake" },
    FleetEntry { key: "fifth-avenue", device_id: "fifth-avenue-sensor", location: "Fifth Avenue" },
    FleetEntry { key: "nac", device_id: "nac-sensor", location: "NAC" },
];

/// Environment variable holding the connection string for a fleet key,
/// e.g. `dows-lake` -> `DOWS_LAKE_CONNECTION_STRING`.
#[must_use]
pub fn connection_env_var(key: &str) -> String {
    format!("{}_CONNECTION_STRING", key.to_uppercase().replace('-', "_"))
}

/// Parsed per-device connection string.
///
/// Wire form: `HostName=<host:port>;DeviceId=<id>;SharedAccessKey=<key>`.
/// Field order is not significant; unknown fields are rejected so typos
/// surface at startup instead of as auth failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Ingestion endpoint address, `host:port`.
    pub host: String,
    /// Device identity presented at connect.
    pub device_id: String,
    /// Shared access key presented at connect.
    pub shared_access_key: String,
}

impl Credential {
    /// Parse a connection string.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let mut host = None;
        let mut device_id = None;
        let mut key = None;

        for part in raw.split(';').filter(|p| !p.trim().is_empty()) {
            let Some((name, value)) = part.split_once('=') else {
                return Err(CredentialError::MalformedField(part.trim().to_string()));
            };
            let value = value.trim();
            if value.is_empty() {
                return Err(CredentialError::EmptyField(name.trim().to_string()));
            }

            match name.trim() {
                "HostName" => host = Some(value.to_string()),
                "DeviceId" => device_id = Some(value.to_string()),
                "SharedAccessKey" => key = Some(value.to_string()),
                other => return Err(CredentialError::UnknownField(other.to_string())),
            }
        }

        Ok(Self {
            host: host.ok_or(CredentialError::MissingField("HostName"))?,
            device_id: device_id.ok_or(CredentialError::MissingField("DeviceId"))?,
            shared_access_key: key.ok_or(CredentialError::MissingField("SharedAccessKey"))?,
        })
    }
}

/// Why a connection string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// A `Name=Value` pair was malformed.
    #[error("malformed field {0:?}, expected Name=Value")]
    MalformedField(String),
    /// A field had an empty value.
    #[error("field {0:?} has an empty value")]
    EmptyField(String),
    /// A field name is not part of the connection-string format.
    #[error("unknown field {0:?}")]
    UnknownField(String),
    /// A required field was absent.
    #[error("missing required field {0}")]
    MissingField(&'static str),
}

/// Fully-resolved configuration for one sensor slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    /// Stable fleet key.
    pub key: String,
    /// Device identity at the ingestion endpoint.
    pub device_id: String,
    /// Human-readable location name.
    pub location: String,
    /// Connection credential for this device.
    pub credential: Credential,
}

/// Timing parameters for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Interval between ticks, measured from the start of the previous
    /// tick's processing.
    pub tick_interval: Duration,
    /// Total run duration. `None` runs until cancelled.
    pub duration: Option<Duration>,
    /// How long in-flight publishes may settle after cancellation before
    /// being abandoned.
    pub cancel_grace: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            duration: Some(DEFAULT_DURATION),
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }
}

/// Configuration failures, surfaced per sensor before any connect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The credential env var for a sensor is not set.
    #[error("sensor {sensor}: credential not set, expected environment variable {env_var}")]
    MissingCredential {
        /// Fleet key of the affected sensor.
        sensor: String,
        /// Environment variable that was expected.
        env_var: String,
    },

    /// The credential for a sensor did not parse.
    #[error("sensor {sensor}: malformed credential: {source}")]
    MalformedCredential {
        /// Fleet key of the affected sensor.
        sensor: String,
        /// Parse failure detail.
        #[source]
        source: CredentialError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_connection_string() {
        let cred = Credential::parse(
            "HostName=ingest.example.net:8883;DeviceId=nac-sensor;SharedAccessKey=abc123=",
        )
        .unwrap();

        assert_eq!(cred.host, "ingest.example.net:8883");
        assert_eq!(cred.device_id, "nac-sensor");
        assert_eq!(cred.shared_access_key, "abc123=");
    }

    #[test]
    fn field_order_is_not_significant() {
        let cred = Credential::parse(
            "SharedAccessKey=k;HostName=h:1;DeviceId=d",
        )
        .unwrap();
        assert_eq!(cred.device_id, "d");
    }

    #[test]
    fn missing_field_is_rejected() {
        let err = Credential::parse("HostName=h:1;DeviceId=d").unwrap_err();
        assert_eq!(err, CredentialError::MissingField("SharedAccessKey"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = Credential::parse("HostName=h:1;DeviceId=d;SharedKey=k").unwrap_err();
        assert_eq!(err, CredentialError::UnknownField("SharedKey".to_string()));
    }

    #[test]
    fn malformed_pair_is_rejected() {
        let err = Credential::parse("HostName").unwrap_err();
        assert_eq!(err, CredentialError::MalformedField("HostName".to_string()));
    }

    #[test]
    fn env_var_names_match_the_fleet_table() {
        assert_eq!(connection_env_var("dows-lake"), "DOWS_LAKE_CONNECTION_STRING");
        assert_eq!(connection_env_var("fifth-avenue"), "FIFTH_AVENUE_CONNECTION_STRING");
        assert_eq!(connection_env_var("nac"), "NAC_CONNECTION_STRING");
    }
}
