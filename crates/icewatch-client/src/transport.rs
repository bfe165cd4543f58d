//! Transport trait abstracting the ingestion endpoint.
//!
//! The endpoint is an external collaborator: all the session layer needs is
//! connect, send, and close. Implementations provide the real wire protocol
//! ([`TcpTransport`](crate::TcpTransport)) or deterministic test doubles
//! (the harness's scripted transport), so the same session and scheduler
//! code runs in production and in simulation.

use std::future::Future;

use icewatch_core::Credential;

use crate::error::TransportError;

/// Connection to the ingestion endpoint for one device.
///
/// One transport instance is owned by exactly one
/// [`PublishSession`](crate::PublishSession); implementations need no
/// internal synchronization.
pub trait Transport: Send {
    /// Establish the connection and authenticate with `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unauthorized`] if the endpoint rejects the
    /// credential, [`TransportError::Refused`] or
    /// [`TransportError::Timeout`] if the endpoint is unreachable.
    fn connect(
        &mut self,
        credential: &Credential,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send one serialized reading and wait for the endpoint to accept it.
    ///
    /// # Errors
    ///
    /// Transient errors ([`TransportError::is_transient`]) leave the
    /// connection usable; anything else means the connection is dead.
    fn send(&mut self, payload: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Tear the connection down. Best effort; never fails and may be
    /// called at any time, in any state.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
