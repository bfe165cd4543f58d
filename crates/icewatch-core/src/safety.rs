//! Tri-state ice safety classification.
//!
//! Mirrors the downstream analytics rule so operators watching the simulator
//! logs see the same status the pipeline would derive. Display-only: the
//! status is never transmitted to the ingestion endpoint.

use std::fmt;

/// Skating safety category derived from ice thickness and surface
/// temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyStatus {
    /// Thick, cold ice.
    Safe,
    /// Marginal conditions.
    Caution,
    /// Unsafe to skate.
    Unsafe,
}

impl SafetyStatus {
    /// Classify a reading. Boundary values are inclusive and `Safe` is
    /// checked before `Caution`: a reading satisfying both predicates is
    /// reported `Safe`.
    #[must_use]
    pub fn classify(ice_thickness_cm: f64, surface_temp_c: f64) -> Self {
        if ice_thickness_cm >= 30.0 && surface_temp_c <= -2.0 {
            Self::Safe
        } else if ice_thickness_cm >= 25.0 && surface_temp_c <= 0.0 {
            Self::Caution
        } else {
            Self::Unsafe
        }
    }
}

impl fmt::Display for SafetyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "SAFE"),
            Self::Caution => write!(f, "CAUTION"),
            Self::Unsafe => write!(f, "UNSAFE"),
        }
    }
}
