//! Production transport: line-delimited JSON over TCP.
//!
//! Wire protocol, one JSON object per line:
//!
//! 1. connect: client sends `{"deviceId", "sharedAccessKey"}`, endpoint
//!    answers `{"status": "accepted" | "unauthorized"}`
//! 2. publish: client sends the reading, endpoint answers
//!    `{"status": "accepted" | "throttled" | "unauthorized"}`
//!
//! Status mapping follows the session's failure policy: `throttled` and
//! deadline overruns are transient; `unauthorized` and a dropped
//! connection are fatal.

use std::{io, time::Duration};

use icewatch_core::Credential;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};

use crate::{error::TransportError, transport::Transport};

/// Deadline for each connect, write, and acknowledgement read.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

const STATUS_ACCEPTED: &str = "accepted";
const STATUS_THROTTLED: &str = "throttled";
const STATUS_UNAUTHORIZED: &str = "unauthorized";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    device_id: &'a str,
    shared_access_key: &'a str,
}

#[derive(Deserialize)]
struct StatusReply {
    status: String,
}

/// TCP transport to the ingestion endpoint.
#[derive(Debug)]
pub struct TcpTransport {
    op_timeout: Duration,
    stream: Option<BufReader<TcpStream>>,
}

impl TcpTransport {
    /// Create a disconnected transport with the default per-operation
    /// deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_OP_TIMEOUT)
    }

    /// Create a disconnected transport with a custom per-operation
    /// deadline.
    #[must_use]
    pub fn with_timeout(op_timeout: Duration) -> Self {
        Self { op_timeout, stream: None }
    }

    /// Write one line and read the endpoint's status acknowledgement.
    async fn roundtrip(&mut self, line: &[u8]) -> Result<String, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::Io("transport is not connected".to_string()));
        };

        let write = async {
            stream.write_all(line).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await?;
            Ok::<(), io::Error>(())
        };
        timeout(self.op_timeout, write)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|err| TransportError::ConnectionLost(err.to_string()))?;

        let mut reply = String::new();
        let read = timeout(self.op_timeout, stream.read_line(&mut reply))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|err| TransportError::ConnectionLost(err.to_string()))?;
        if read == 0 {
            return Err(TransportError::ConnectionLost(
                "endpoint closed the connection".to_string(),
            ));
        }

        let reply: StatusReply = serde_json::from_str(&reply)
            .map_err(|err| TransportError::Io(format!("malformed status reply: {err}")))?;
        Ok(reply.status)
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    async fn connect(&mut self, credential: &Credential) -> Result<(), TransportError> {
        let stream = timeout(self.op_timeout, TcpStream::connect(&credential.host))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|err| match err.kind() {
                io::ErrorKind::ConnectionRefused => TransportError::Refused(err.to_string()),
                _ => TransportError::Io(err.to_string()),
            })?;
        self.stream = Some(BufReader::new(stream));

        let auth = AuthRequest {
            device_id: &credential.device_id,
            shared_access_key: &credential.shared_access_key,
        };
        let line = serde_json::to_vec(&auth)
            .map_err(|err| TransportError::Io(err.to_string()))?;

        match self.roundtrip(&line).await {
            Ok(status) if status == STATUS_ACCEPTED => Ok(()),
            Ok(status) if status == STATUS_UNAUTHORIZED => {
                self.stream = None;
                Err(TransportError::Unauthorized)
            },
            Ok(status) => {
                self.stream = None;
                Err(TransportError::Refused(format!("unexpected status {status:?}")))
            },
            Err(err) => {
                self.stream = None;
                Err(err)
            },
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        match self.roundtrip(payload).await?.as_str() {
            STATUS_ACCEPTED => Ok(()),
            STATUS_THROTTLED => Err(TransportError::Throttled),
            STATUS_UNAUTHORIZED => Err(TransportError::Unauthorized),
            other => Err(TransportError::Io(format!("unexpected status {other:?}"))),
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // Best effort; the endpoint may already be gone.
            let _ = stream.shutdown().await;
        }
    }
}
