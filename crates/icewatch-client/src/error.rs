//! Error types for the publish path.
//!
//! Strongly-typed per layer: transport errors carry the wire-level cause and
//! classify themselves as transient or fatal; session errors wrap them with
//! the sensor identity so every log line and report names the sensor it
//! belongs to.

use thiserror::Error;

use crate::session::SessionState;

/// Errors raised by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint refused the connection or handshake.
    #[error("endpoint refused the connection: {0}")]
    Refused(String),

    /// The endpoint rejected this device's credential.
    #[error("credential rejected by endpoint")]
    Unauthorized,

    /// The endpoint is shedding load; retry next tick.
    #[error("endpoint throttled the request")]
    Throttled,

    /// An operation did not complete within its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The connection dropped mid-session.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Other I/O failure.
    #[error("i/o error: {0}")]
    Io(String),
}

impl TransportError {
    /// Returns true if this error is transient and the session stays
    /// usable.
    ///
    /// Throttling and timeouts are retryable on the next tick. Credential
    /// rejection and a lost connection are not; the endpoint's own error
    /// taxonomy is not authoritative here, so anything ambiguous is
    /// treated as fatal rather than retried forever.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled | Self::Timeout)
    }
}

/// A sensor failed to establish its session.
///
/// Isolated per sensor: the scheduler excludes the sensor and continues
/// with the rest unless every sensor fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sensor {sensor}: connect failed: {source}")]
pub struct ConnectError {
    /// Device identity of the affected sensor.
    pub sensor: String,
    /// Wire-level cause.
    #[source]
    pub source: TransportError,
}

/// A publish attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Recoverable failure; the sensor skips this tick and the session
    /// remains open.
    #[error("sensor {sensor}: transient publish failure: {source}")]
    Transient {
        /// Device identity of the affected sensor.
        sensor: String,
        /// Wire-level cause.
        #[source]
        source: TransportError,
    },

    /// Unrecoverable failure; the session is now
    /// [`SessionState::Failed`] and the sensor is excluded from
    /// remaining ticks.
    #[error("sensor {sensor}: fatal publish failure: {source}")]
    Fatal {
        /// Device identity of the affected sensor.
        sensor: String,
        /// Wire-level cause.
        #[source]
        source: TransportError,
    },

    /// Publish was called outside the `Connected` state.
    #[error("sensor {sensor}: cannot publish in state {state:?}")]
    NotConnected {
        /// Device identity of the affected sensor.
        sensor: String,
        /// State the session was in.
        state: SessionState,
    },
}
