//! Per-location sensor state.

use chrono::{DateTime, Utc};
use rand::{SeedableRng, rngs::StdRng};

use crate::{Reading, walk::BoundedWalk, walk::WalkProfile};

/// Simulated fixed-location sensor.
///
/// Aggregates four independent [`BoundedWalk`]s plus identity metadata and
/// owns its RNG, so sensor slots share no mutable state and a seeded sensor
/// replays the same series. Created once per configured location at
/// scheduler start and discarded at shutdown; state is never persisted.
#[derive(Debug, Clone)]
pub struct Sensor {
    device_id: String,
    location: String,
    ice_thickness: BoundedWalk,
    surface_temp: BoundedWalk,
    snow_accumulation: BoundedWalk,
    external_temp: BoundedWalk,
    rng: StdRng,
}

impl Sensor {
    /// Create a sensor with entropy-seeded walks at the documented baseline
    /// ranges.
    pub fn new(device_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self::with_rng(device_id, location, StdRng::from_entropy())
    }

    /// Create a sensor with a fixed seed. Deterministic; for tests.
    pub fn with_seed(device_id: impl Into<String>, location: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(device_id, location, StdRng::seed_from_u64(seed))
    }

    fn with_rng(device_id: impl Into<String>, location: impl Into<String>, mut rng: StdRng) -> Self {
        Self {
            device_id: device_id.into(),
            location: location.into(),
            ice_thickness: WalkProfile::ICE_THICKNESS_CM.spawn(&mut rng),
            surface_temp: WalkProfile::SURFACE_TEMP_C.spawn(&mut rng),
            snow_accumulation: WalkProfile::SNOW_ACCUMULATION_CM.spawn(&mut rng),
            external_temp: WalkProfile::EXTERNAL_TEMP_C.spawn(&mut rng),
            rng,
        }
    }

    /// Ingestion-endpoint device identity.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Human-readable location name.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Advance all four walks and produce a reading stamped with the
    /// current UTC instant.
    ///
    /// Permanently advances internal state: two calls yield two different,
    /// correlated readings. Infallible.
    pub fn next_reading(&mut self) -> Reading {
        self.next_reading_at(Utc::now())
    }

    /// [`Sensor::next_reading`] with an explicit timestamp, for tests that
    /// pin the clock.
    pub fn next_reading_at(&mut self, timestamp: DateTime<Utc>) -> Reading {
        let rng: &mut StdRng = &mut self.rng;
        Reading {
            device_id: self.device_id.clone(),
            location: self.location.clone(),
            timestamp,
            ice_thickness: self.ice_thickness.step(rng),
            surface_temp: self.surface_temp.step(rng),
            snow_accumulation: self.snow_accumulation.step(rng),
            external_temp: self.external_temp.step(rng),
        }
    }
}
