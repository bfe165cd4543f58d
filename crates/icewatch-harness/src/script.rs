//! In-memory transport with scripted outcomes.

use std::{collections::VecDeque, sync::Arc};

use icewatch_client::{Transport, TransportError};
use icewatch_core::{Credential, Reading};

use crate::recorder::Recorder;

/// Outcome of one scripted publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    /// Endpoint accepts and records the reading.
    Accept,
    /// Endpoint throttles (transient).
    Throttle,
    /// Endpoint revokes the credential (fatal).
    Revoke,
    /// Connection drops mid-send (fatal).
    Drop,
}

/// Deterministic in-memory [`Transport`].
///
/// Pops one [`ScriptStep`] per send; an exhausted script accepts
/// everything. Accepted payloads are decoded and pushed to the shared
/// [`Recorder`], so scheduler tests can assert on what "reached" the
/// endpoint without any real I/O.
#[derive(Debug)]
pub struct ScriptedTransport {
    device_id: String,
    refuse_connect: bool,
    script: VecDeque<ScriptStep>,
    recorder: Arc<Recorder>,
}

impl ScriptedTransport {
    /// Transport that connects and accepts every publish.
    #[must_use]
    pub fn accepting(device_id: impl Into<String>, recorder: &Arc<Recorder>) -> Self {
        Self::scripted(device_id, recorder, [])
    }

    /// Transport that connects and then follows `script`.
    pub fn scripted(
        device_id: impl Into<String>,
        recorder: &Arc<Recorder>,
        script: impl IntoIterator<Item = ScriptStep>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            refuse_connect: false,
            script: script.into_iter().collect(),
            recorder: Arc::clone(recorder),
        }
    }

    /// Transport whose connect attempt is refused.
    #[must_use]
    pub fn refusing(device_id: impl Into<String>, recorder: &Arc<Recorder>) -> Self {
        Self { refuse_connect: true, ..Self::accepting(device_id, recorder) }
    }
}

impl Transport for ScriptedTransport {
    async fn connect(&mut self, _credential: &Credential) -> Result<(), TransportError> {
        if self.refuse_connect {
            Err(TransportError::Refused("scripted refusal".to_string()))
        } else {
            Ok(())
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        match self.script.pop_front().unwrap_or(ScriptStep::Accept) {
            ScriptStep::Accept => {
                let reading: Reading = serde_json::from_slice(payload)
                    .map_err(|err| TransportError::Io(format!("undecodable payload: {err}")))?;
                self.recorder.record_publish(&self.device_id, reading);
                Ok(())
            },
            ScriptStep::Throttle => Err(TransportError::Throttled),
            ScriptStep::Revoke => Err(TransportError::Unauthorized),
            ScriptStep::Drop => {
                Err(TransportError::ConnectionLost("scripted drop".to_string()))
            },
        }
    }

    async fn close(&mut self) {
        self.recorder.record_close(&self.device_id);
    }
}
