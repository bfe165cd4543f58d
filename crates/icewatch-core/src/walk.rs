//! Bounded random-walk state for a single measured parameter.
//!
//! Each sensor parameter (ice thickness, temperatures, snow depth) drifts by
//! a small uniform delta per step and is clamped to a fixed physical range.
//! This produces continuous series rather than i.i.d. samples: consecutive
//! values never differ by more than the largest configured delta magnitude.

use rand::Rng;

/// Configuration for one walk: where it starts, where it is allowed to go,
/// and how far it may move per step.
///
/// The step interval need not be symmetric. Ice thickness, for example, uses
/// a more-negative-biased interval to model gradual melting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkProfile {
    /// Range the initial value is drawn from, `(low, high)`.
    pub initial: (f64, f64),
    /// Closed clamp range the value never leaves, `(lower, upper)`.
    pub bounds: (f64, f64),
    /// Uniform per-step delta range, `(min_delta, max_delta)`.
    pub step: (f64, f64),
}

impl WalkProfile {
    /// Ice thickness in centimetres. Melt-biased: drifts down on average.
    pub const ICE_THICKNESS_CM: Self =
        Self { initial: (28.0, 35.0), bounds: (20.0, 40.0), step: (-0.5, 0.3) };

    /// Ice surface temperature in degrees Celsius.
    pub const SURFACE_TEMP_C: Self =
        Self { initial: (-10.0, -1.0), bounds: (-15.0, 2.0), step: (-0.3, 0.2) };

    /// Snow accumulation on the ice in centimetres.
    pub const SNOW_ACCUMULATION_CM: Self =
        Self { initial: (0.0, 5.0), bounds: (0.0, 10.0), step: (-0.3, 0.4) };

    /// Ambient air temperature in degrees Celsius.
    pub const EXTERNAL_TEMP_C: Self =
        Self { initial: (-12.0, -2.0), bounds: (-20.0, 5.0), step: (-0.4, 0.3) };

    /// Draw a starting value and build the walk.
    pub fn spawn<R: Rng>(&self, rng: &mut R) -> BoundedWalk {
        let seed = rng.gen_range(self.initial.0..=self.initial.1);
        BoundedWalk::new(seed, self.bounds, self.step)
    }

    /// Largest movement a single step can produce.
    #[must_use]
    pub fn max_step(&self) -> f64 {
        self.step.0.abs().max(self.step.1.abs())
    }
}

/// Random-walk state clamped to a closed range.
///
/// Mutated only through [`BoundedWalk::step`]; the invariant
/// `lower <= value <= upper` holds after construction and after every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedWalk {
    value: f64,
    lower: f64,
    upper: f64,
    min_delta: f64,
    max_delta: f64,
}

impl BoundedWalk {
    /// Create a walk at `seed`, clamped into `bounds`.
    ///
    /// Bounds and step ranges are fixed tables validated by construction;
    /// inverted inputs are a programming error.
    pub fn new(seed: f64, bounds: (f64, f64), step: (f64, f64)) -> Self {
        let (lower, upper) = bounds;
        let (min_delta, max_delta) = step;
        debug_assert!(lower <= upper, "inverted walk bounds");
        debug_assert!(min_delta <= max_delta, "inverted step range");

        Self { value: seed.clamp(lower, upper), lower, upper, min_delta, max_delta }
    }

    /// Current value. Always within bounds.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Advance the walk by one uniform delta and clamp. Returns the new
    /// value. Infallible, O(1).
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> f64 {
        let delta = rng.gen_range(self.min_delta..=self.max_delta);
        self.value = (self.value + delta).clamp(self.lower, self.upper);
        self.value
    }
}
