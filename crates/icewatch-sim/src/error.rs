//! Run-level errors.
//!
//! Per-sensor failures are isolated and reported through the
//! [`RunReport`](crate::RunReport); the only failure that aborts a run is
//! every sensor failing to connect at startup.

use icewatch_client::ConnectError;
use thiserror::Error;

/// Fatal startup condition: the run could not begin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// No sensor managed to connect; there is nothing to simulate.
    #[error("no sensors connected: {}", format_failures(.0))]
    NoSensorsConnected(
        /// Connect failure per configured sensor.
        Vec<ConnectError>,
    ),

    /// The run was started with an empty sensor list.
    #[error("no sensors configured")]
    NoSensorsConfigured,
}

fn format_failures(failures: &[ConnectError]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
