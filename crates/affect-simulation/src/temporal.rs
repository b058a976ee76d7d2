//! Temporal state generation: correlated (previous, current) axis pairs.
//!
//! In dynamic mode `current = clamp(previous + N(0, σ))` per axis, with σ
//! chosen per family. The delta must be wide enough that gate thresholds get
//! crossed between the two instants, otherwise persistence and transition
//! expressions can never fire.

use rand::Rng;
use serde::{Deserialize, Serialize};

use affect_types::{
    AxisState, MoodAxis, SamplingDistribution, SamplingMode, SexualAxis, SimulationConfig,
    TraitState, TRAIT_AXIS_RANGE,
};

/// Axis states at two consecutive instants.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TemporalPair {
    pub previous: AxisState,
    pub current: AxisState,
}

/// Per-family standard deviations of the dynamic delta (raw axis units).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeltaProfile {
    pub mood_std_dev: f64,
    pub sexual_std_dev: f64,
}

/// Draws temporal pairs from an injected random source.
#[derive(Clone, Debug)]
pub struct TemporalStateGenerator {
    deltas: DeltaProfile,
}

impl TemporalStateGenerator {
    pub fn new(deltas: DeltaProfile) -> Self {
        Self { deltas }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(DeltaProfile {
            mood_std_dev: config.mood_delta_std_dev,
            sexual_std_dev: config.sexual_delta_std_dev,
        })
    }

    pub fn deltas(&self) -> DeltaProfile {
        self.deltas
    }

    /// Generate one temporal pair.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        distribution: SamplingDistribution,
        mode: SamplingMode,
        rng: &mut R,
    ) -> TemporalPair {
        let previous = self.sample_state(distribution, rng);
        let current = match mode {
            SamplingMode::Static => self.sample_state(distribution, rng),
            SamplingMode::Dynamic => self.perturb(&previous, rng),
        };
        TemporalPair { previous, current }
    }

    /// Draw one state from the marginal law.
    pub fn sample_state<R: Rng + ?Sized>(
        &self,
        distribution: SamplingDistribution,
        rng: &mut R,
    ) -> AxisState {
        let mut mood = [0.0; 7];
        for axis in MoodAxis::ALL {
            mood[axis.index()] = draw(axis.range(), distribution, rng);
        }
        let mut sexual = [0.0; 3];
        for axis in SexualAxis::ALL {
            sexual[axis.index()] = draw(axis.range(), distribution, rng);
        }
        AxisState::clamped(mood, sexual)
    }

    /// Uniform traits; traits do not move between instants.
    pub fn sample_traits<R: Rng + ?Sized>(&self, rng: &mut R) -> TraitState {
        let (lo, hi) = TRAIT_AXIS_RANGE;
        TraitState::clamped([
            rng.gen_range(lo..=hi),
            rng.gen_range(lo..=hi),
            rng.gen_range(lo..=hi),
        ])
    }

    fn perturb<R: Rng + ?Sized>(&self, previous: &AxisState, rng: &mut R) -> AxisState {
        let mut mood = *previous.mood_values();
        for v in mood.iter_mut() {
            *v += standard_normal(rng) * self.deltas.mood_std_dev;
        }
        let mut sexual = *previous.sexual_values();
        for v in sexual.iter_mut() {
            *v += standard_normal(rng) * self.deltas.sexual_std_dev;
        }
        // Clamp rather than reject so every trial survives.
        AxisState::clamped(mood, sexual)
    }
}

impl Default for TemporalStateGenerator {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

fn draw<R: Rng + ?Sized>(
    (lo, hi): (f64, f64),
    distribution: SamplingDistribution,
    rng: &mut R,
) -> f64 {
    match distribution {
        SamplingDistribution::Uniform => rng.gen_range(lo..=hi),
        SamplingDistribution::Gaussian { spread } => {
            let mid = (lo + hi) / 2.0;
            let half = (hi - lo) / 2.0;
            (mid + standard_normal(rng) * spread * half).clamp(lo, hi)
        }
    }
}

/// Standard normal draw via the Box–Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - U keeps u1 in (0, 1] so ln never sees 0.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
