//! Core domain model for the icewatch sensor fleet.
//!
//! Pure state and classification logic with no I/O, enabling deterministic
//! testing with seeded RNGs and pinned clocks. The publish and scheduling
//! layers live in `icewatch-client` and `icewatch-sim`.
//!
//! # Components
//!
//! - [`BoundedWalk`]: clamped random-walk state for one measured parameter
//! - [`Sensor`]: per-location sensor state producing timestamped readings
//! - [`Reading`]: immutable wire-format value object
//! - [`SafetyStatus`]: tri-state ice safety classification (display only)
//! - [`SensorConfig`] / [`Credential`]: fleet configuration types

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod reading;
mod safety;
mod sensor;
mod walk;

pub use config::{
    ConfigError, Credential, CredentialError, DEFAULT_FLEET, FleetEntry, RunConfig, SensorConfig,
    connection_env_var,
};
pub use reading::Reading;
pub use safety::SafetyStatus;
pub use sensor::Sensor;
pub use walk::{BoundedWalk, WalkProfile};
