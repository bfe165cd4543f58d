//! Shared recording of everything the endpoint accepted.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use icewatch_core::Reading;

/// One reading accepted by the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPublish {
    /// Device the reading arrived from.
    pub device_id: String,
    /// The decoded reading.
    pub reading: Reading,
}

/// Thread-safe ledger of accepted readings and transport closes, shared
/// between the test and the endpoint double.
#[derive(Debug, Default)]
pub struct Recorder {
    publishes: Mutex<Vec<RecordedPublish>>,
    closes: Mutex<HashMap<String, usize>>,
}

impl Recorder {
    /// Create an empty shared recorder.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record an accepted reading.
    pub fn record_publish(&self, device_id: &str, reading: Reading) {
        let entry = RecordedPublish { device_id: device_id.to_string(), reading };
        if let Ok(mut publishes) = self.publishes.lock() {
            publishes.push(entry);
        }
    }

    /// Record a transport close for `device_id`.
    pub fn record_close(&self, device_id: &str) {
        if let Ok(mut closes) = self.closes.lock() {
            *closes.entry(device_id.to_string()).or_insert(0) += 1;
        }
    }

    /// Everything accepted so far, in arrival order.
    #[must_use]
    pub fn publishes(&self) -> Vec<RecordedPublish> {
        self.publishes.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Accepted readings for one device, in arrival order.
    #[must_use]
    pub fn readings_for(&self, device_id: &str) -> Vec<Reading> {
        self.publishes()
            .into_iter()
            .filter(|p| p.device_id == device_id)
            .map(|p| p.reading)
            .collect()
    }

    /// How many times `device_id`'s transport was closed.
    #[must_use]
    pub fn closes_for(&self, device_id: &str) -> usize {
        self.closes.lock().ok().and_then(|c| c.get(device_id).copied()).unwrap_or(0)
    }
}
