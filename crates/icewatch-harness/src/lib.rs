//! Test endpoint and transports for the icewatch fleet.
//!
//! Two doubles for the opaque ingestion endpoint, at different levels:
//!
//! - [`ScriptedTransport`]: in-memory [`Transport`](icewatch_client::Transport)
//!   with per-call scripted outcomes. Runs under a paused tokio clock, so
//!   scheduler tests are fully deterministic.
//! - [`SimHub`]: an in-process TCP endpoint speaking the production wire
//!   protocol, with a device-key registry and injectable throttling and
//!   credential revocation. Exercises the real
//!   [`TcpTransport`](icewatch_client::TcpTransport).
//!
//! Both record accepted readings in a shared [`Recorder`] so tests can
//! assert on exactly what reached the endpoint.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod hub;
mod recorder;
mod script;

pub use hub::SimHub;
pub use recorder::{RecordedPublish, Recorder};
pub use script::{ScriptStep, ScriptedTransport};
