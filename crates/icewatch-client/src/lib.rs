//! Ingestion-endpoint client for icewatch sensors.
//!
//! One [`PublishSession`] owns one sensor's connection lifecycle
//! (connect, publish loop, close) over a pluggable [`Transport`]. The
//! session is the failure-isolation boundary: transient send failures skip
//! a tick and keep the session open, fatal ones permanently fail it, and
//! neither affects other sensors.
//!
//! # Components
//!
//! - [`Transport`]: connect/send/close seam over the opaque endpoint
//! - [`PublishSession`]: per-sensor lifecycle state machine
//! - [`TcpTransport`]: production line-delimited-JSON transport

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod session;
mod tcp;
mod transport;

pub use error::{ConnectError, PublishError, TransportError};
pub use session::{PublishSession, SessionState};
pub use tcp::TcpTransport;
pub use transport::Transport;
