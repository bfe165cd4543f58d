//! Publish session state machine.
//!
//! Owns the connect → publish loop → close lifecycle for one sensor's
//! connection to the ingestion endpoint.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ connect() ┌────────────┐    ok     ┌───────────┐
//! │ Disconnected │──────────>│ Connecting │──────────>│ Connected │
//! └──────────────┘           └────────────┘           └───────────┘
//!        ▲                         │ error              │        │
//!        │ close()                 ▼                    │ fatal  │
//!        │                    ┌────────┐   publish()    │ send   │
//!        └────────────────────│ Failed │<───────────────┘        │
//!                             └────────┘     (transient send     │
//!                                             stays Connected) <─┘
//! ```
//!
//! Transient send failures are reported but leave the session `Connected`;
//! fatal ones (credential revoked, connection lost) move it to `Failed`
//! and the scheduler drops the slot. `close()` is idempotent and
//! infallible on every state.

use icewatch_core::{Credential, Reading};

use crate::{
    error::{ConnectError, PublishError, TransportError},
    transport::Transport,
};

/// Lifecycle state of a publish session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection. Initial state, and the state after a graceful close.
    Disconnected,
    /// `connect()` in progress.
    Connecting,
    /// Open and accepting publishes.
    Connected,
    /// Unrecoverable failure; the session will not be used again.
    Failed,
}

/// One sensor's connection lifecycle to the ingestion endpoint.
///
/// Owned exclusively by that sensor's scheduling slot; created at scheduler
/// startup and torn down at shutdown or on unrecoverable failure.
#[derive(Debug)]
pub struct PublishSession<T: Transport> {
    device_id: String,
    location: String,
    credential: Credential,
    state: SessionState,
    transport: T,
}

impl<T: Transport> PublishSession<T> {
    /// Create a session in [`SessionState::Disconnected`].
    pub fn new(
        device_id: impl Into<String>,
        location: impl Into<String>,
        credential: Credential,
        transport: T,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            location: location.into(),
            credential,
            state: SessionState::Disconnected,
            transport,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Device identity this session publishes for.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Establish the connection using this sensor's credential.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] on transport or auth failure; the session
    /// is then [`SessionState::Failed`] and the caller decides whether the
    /// sensor sits the run out.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        self.state = SessionState::Connecting;

        match self.transport.connect(&self.credential).await {
            Ok(()) => {
                self.state = SessionState::Connected;
                tracing::info!("connected: {} ({})", self.location, self.device_id);
                Ok(())
            },
            Err(source) => {
                self.state = SessionState::Failed;
                tracing::warn!(
                    "connect failed: {} ({}): {}",
                    self.location,
                    self.device_id,
                    source
                );
                Err(ConnectError { sensor: self.device_id.clone(), source })
            },
        }
    }

    /// Serialize `reading` and send it over the open connection.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Transient`]: reported, tick skipped, session stays
    ///   `Connected`
    /// - [`PublishError::Fatal`]: session moves to `Failed`
    /// - [`PublishError::NotConnected`]: called outside `Connected`
    pub async fn publish(&mut self, reading: &Reading) -> Result<(), PublishError> {
        if self.state != SessionState::Connected {
            return Err(PublishError::NotConnected {
                sensor: self.device_id.clone(),
                state: self.state,
            });
        }

        let payload = match serde_json::to_vec(reading) {
            Ok(payload) => payload,
            Err(err) => {
                // Reading serialization is infallible in practice; if it
                // ever breaks, the session is unusable.
                self.state = SessionState::Failed;
                return Err(PublishError::Fatal {
                    sensor: self.device_id.clone(),
                    source: TransportError::Io(err.to_string()),
                });
            },
        };

        match self.transport.send(&payload).await {
            Ok(()) => Ok(()),
            Err(source) if source.is_transient() => {
                tracing::warn!(
                    "transient publish failure: {} ({}): {}",
                    self.location,
                    self.device_id,
                    source
                );
                Err(PublishError::Transient { sensor: self.device_id.clone(), source })
            },
            Err(source) => {
                self.state = SessionState::Failed;
                tracing::error!(
                    "fatal publish failure: {} ({}): {}",
                    self.location,
                    self.device_id,
                    source
                );
                Err(PublishError::Fatal { sensor: self.device_id.clone(), source })
            },
        }
    }

    /// Gracefully tear down the connection.
    ///
    /// Idempotent: a no-op on sessions that are already closed or failed.
    /// Never fails.
    pub async fn close(&mut self) {
        match self.state {
            SessionState::Connected | SessionState::Connecting => {
                self.transport.close().await;
                self.state = SessionState::Disconnected;
                tracing::info!("disconnected: {} ({})", self.location, self.device_id);
            },
            SessionState::Disconnected | SessionState::Failed => {},
        }
    }
}
