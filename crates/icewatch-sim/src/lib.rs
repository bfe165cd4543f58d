//! Simulation scheduler for the icewatch fleet.
//!
//! Drives N independent publish sessions in lockstep on a fixed interval:
//! one coordinating timer, a concurrent per-sensor fan-out each tick, and
//! guaranteed session cleanup on every exit path (duration elapsed,
//! cancellation, or no sensors left). Sensor slots own disjoint state, so
//! the fan-out needs no locks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod scheduler;

pub use error::RunError;
pub use scheduler::{RunReport, run};
