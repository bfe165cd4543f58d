//! In-process TCP ingestion endpoint.

use std::{
    collections::{HashMap, HashSet},
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use icewatch_core::{Credential, Reading};
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

use crate::recorder::Recorder;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest {
    device_id: String,
    shared_access_key: String,
}

/// Failures a test can inject per device.
#[derive(Debug, Default)]
struct FaultPlan {
    throttle_once: Mutex<HashSet<String>>,
    revoked: Mutex<HashSet<String>>,
}

impl FaultPlan {
    fn take_throttle(&self, device_id: &str) -> bool {
        self.throttle_once.lock().map(|mut set| set.remove(device_id)).unwrap_or(false)
    }

    fn is_revoked(&self, device_id: &str) -> bool {
        self.revoked.lock().map(|set| set.contains(device_id)).unwrap_or(false)
    }
}

/// In-process endpoint speaking the production wire protocol.
///
/// Binds an ephemeral localhost port, validates device keys against its
/// registry, records every accepted reading, and can inject one-shot
/// throttling or permanent credential revocation per device. The accept
/// loop is aborted on drop.
#[derive(Debug)]
pub struct SimHub {
    addr: SocketAddr,
    keys: Arc<HashMap<String, String>>,
    recorder: Arc<Recorder>,
    faults: Arc<FaultPlan>,
    accept_task: JoinHandle<()>,
}

impl SimHub {
    /// Bind the hub with a `(device_id, shared_access_key)` registry.
    pub async fn spawn(keys: &[(&str, &str)]) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let keys: Arc<HashMap<String, String>> = Arc::new(
            keys.iter().map(|(id, key)| ((*id).to_string(), (*key).to_string())).collect(),
        );
        let recorder = Recorder::new();
        let faults = Arc::new(FaultPlan::default());

        let accept_task = {
            let keys = Arc::clone(&keys);
            let recorder = Arc::clone(&recorder);
            let faults = Arc::clone(&faults);
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, peer)) => {
                            tracing::debug!("hub: connection from {peer}");
                            let keys = Arc::clone(&keys);
                            let recorder = Arc::clone(&recorder);
                            let faults = Arc::clone(&faults);
                            tokio::spawn(async move {
                                if let Err(err) =
                                    serve_connection(stream, &keys, &recorder, &faults).await
                                {
                                    tracing::debug!("hub: connection ended: {err}");
                                }
                            });
                        },
                        Err(err) => {
                            tracing::debug!("hub: accept failed: {err}");
                            break;
                        },
                    }
                }
            })
        };

        Ok(Self { addr, keys, recorder, faults, accept_task })
    }

    /// Address the hub is listening on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Credential for a registered device, pointing at this hub.
    #[must_use]
    pub fn credential_for(&self, device_id: &str) -> Option<Credential> {
        self.keys.get(device_id).map(|key| Credential {
            host: self.addr.to_string(),
            device_id: device_id.to_string(),
            shared_access_key: key.clone(),
        })
    }

    /// Connection string for a registered device, as the CLI would load
    /// it from the environment.
    #[must_use]
    pub fn connection_string_for(&self, device_id: &str) -> Option<String> {
        self.keys.get(device_id).map(|key| {
            format!("HostName={};DeviceId={device_id};SharedAccessKey={key}", self.addr)
        })
    }

    /// Ledger of accepted readings.
    #[must_use]
    pub fn recorder(&self) -> Arc<Recorder> {
        Arc::clone(&self.recorder)
    }

    /// Throttle `device_id`'s next publish (one-shot, transient).
    pub fn throttle_next(&self, device_id: &str) {
        if let Ok(mut set) = self.faults.throttle_once.lock() {
            set.insert(device_id.to_string());
        }
    }

    /// Permanently revoke `device_id`'s credential (fatal on next
    /// publish).
    pub fn revoke(&self, device_id: &str) {
        if let Ok(mut set) = self.faults.revoked.lock() {
            set.insert(device_id.to_string());
        }
    }
}

impl Drop for SimHub {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(
    stream: TcpStream,
    keys: &HashMap<String, String>,
    recorder: &Recorder,
    faults: &FaultPlan,
) -> io::Result<()> {
    let mut stream = BufReader::new(stream);
    let mut line = String::new();

    if stream.read_line(&mut line).await? == 0 {
        return Ok(());
    }
    let Ok(auth) = serde_json::from_str::<AuthRequest>(&line) else {
        reply(&mut stream, "unauthorized").await?;
        return Ok(());
    };

    let authorized =
        keys.get(&auth.device_id).is_some_and(|key| *key == auth.shared_access_key);
    if !authorized {
        tracing::debug!("hub: rejected credential for {}", auth.device_id);
        reply(&mut stream, "unauthorized").await?;
        return Ok(());
    }
    reply(&mut stream, "accepted").await?;

    let device_id = auth.device_id;
    loop {
        line.clear();
        if stream.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        if faults.is_revoked(&device_id) {
            reply(&mut stream, "unauthorized").await?;
            continue;
        }
        if faults.take_throttle(&device_id) {
            reply(&mut stream, "throttled").await?;
            continue;
        }

        match serde_json::from_str::<Reading>(&line) {
            Ok(reading) => {
                recorder.record_publish(&device_id, reading);
                reply(&mut stream, "accepted").await?;
            },
            Err(err) => {
                tracing::debug!("hub: undecodable reading from {device_id}: {err}");
                reply(&mut stream, "rejected").await?;
            },
        }
    }
}

async fn reply(stream: &mut BufReader<TcpStream>, status: &str) -> io::Result<()> {
    stream.write_all(format!("{{\"status\":\"{status}\"}}\n").as_bytes()).await?;
    stream.flush().await
}
