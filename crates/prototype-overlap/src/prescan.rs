//! Route C: a bounded behavioral prescan of gate co-occurrence.
//!
//! Pairs that fail Stage A and have incomparable gates may still fire
//! together in practice. A small static sample estimates how often their
//! gates open together before the full behavioral evaluation is paid for.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use affect_simulation::{ContextBuilder, TemporalStateGenerator};
use affect_types::{NormalizedAxes, OverlapConfig, Prototype, SamplingDistribution};

/// Gate co-occurrence over the prescan sample.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescanResult {
    /// onBoth / onEither; 0 when neither gate ever opened.
    pub gate_overlap_ratio: f64,
    pub sample_count: usize,
    pub on_both_count: usize,
    pub on_either_count: usize,
    pub passes: bool,
}

/// Per-pair outcome of [`BehavioralPrescanFilter::filter_pairs`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PrescanOutcome {
    Evaluated(PrescanResult),
    /// The pair budget was exhausted before this pair.
    Skipped,
}

impl PrescanOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Evaluated(r) if r.passes)
    }
}

#[derive(Clone, Debug)]
pub struct BehavioralPrescanFilter {
    sample_count: usize,
    min_gate_overlap: f64,
    max_pairs: usize,
    generator: TemporalStateGenerator,
}

impl BehavioralPrescanFilter {
    pub fn new(config: &OverlapConfig) -> Self {
        Self {
            sample_count: config.prescan_sample_count,
            min_gate_overlap: config.prescan_min_gate_overlap,
            max_pairs: config.max_prescan_pairs,
            generator: TemporalStateGenerator::default(),
        }
    }

    pub fn max_pairs(&self) -> usize {
        self.max_pairs
    }

    /// Sample static states and count how often each gate set opens.
    pub fn prescan<R: Rng + ?Sized>(&self, a: &Prototype, b: &Prototype, rng: &mut R) -> PrescanResult {
        let mut on_both_count = 0;
        let mut on_either_count = 0;
        for _ in 0..self.sample_count {
            let state = self.generator.sample_state(SamplingDistribution::Uniform, rng);
            let traits = self.generator.sample_traits(rng);
            let axes = NormalizedAxes::from_state(&state, &traits);
            let on_a = ContextBuilder::gate_passes(a, &axes);
            let on_b = ContextBuilder::gate_passes(b, &axes);
            if on_a && on_b {
                on_both_count += 1;
            }
            if on_a || on_b {
                on_either_count += 1;
            }
        }
        let gate_overlap_ratio = if on_either_count == 0 {
            0.0
        } else {
            on_both_count as f64 / on_either_count as f64
        };
        PrescanResult {
            gate_overlap_ratio,
            sample_count: self.sample_count,
            on_both_count,
            on_either_count,
            passes: gate_overlap_ratio >= self.min_gate_overlap,
        }
    }

    /// Prescan pairs in order, up to the configured budget.
    pub fn filter_pairs<R: Rng + ?Sized>(
        &self,
        pairs: &[(&Prototype, &Prototype)],
        rng: &mut R,
    ) -> Vec<PrescanOutcome> {
        if pairs.len() > self.max_pairs {
            debug!(
                pairs = pairs.len(),
                budget = self.max_pairs,
                "prescan budget exceeded; remaining pairs skipped"
            );
        }
        pairs
            .iter()
            .enumerate()
            .map(|(i, (a, b))| {
                if i < self.max_pairs {
                    PrescanOutcome::Evaluated(self.prescan(a, b, rng))
                } else {
                    PrescanOutcome::Skipped
                }
            })
            .collect()
    }
}

impl Default for BehavioralPrescanFilter {
    fn default() -> Self {
        Self::new(&OverlapConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affect_types::{Gate, GateOperator, PrototypeKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gated(id: &str, gates: Vec<Gate>) -> Prototype {
        Prototype::new(id, PrototypeKind::Emotion, [("valence", 1.0)], gates)
    }

    #[test]
    fn identical_gates_overlap_fully() {
        let a = gated("a", vec![Gate::new("valence", GateOperator::Gte, 0.0)]);
        let r = BehavioralPrescanFilter::default().prescan(&a, &a, &mut StdRng::seed_from_u64(1));
        assert_eq!(r.gate_overlap_ratio, 1.0);
        assert_eq!(r.on_both_count, r.on_either_count);
        assert!(r.passes);
    }

    #[test]
    fn disjoint_gates_never_overlap() {
        let a = gated("a", vec![Gate::new("valence", GateOperator::Gte, 0.5)]);
        let b = gated("b", vec![Gate::new("valence", GateOperator::Lt, -0.5)]);
        let r = BehavioralPrescanFilter::default().prescan(&a, &b, &mut StdRng::seed_from_u64(2));
        assert_eq!(r.on_both_count, 0);
        assert!(r.on_either_count > 0);
        assert!(!r.passes);
    }

    #[test]
    fn never_open_gates_yield_zero_ratio() {
        let a = gated("a", vec![Gate::new("mystery", GateOperator::Gte, 0.0)]);
        let r = BehavioralPrescanFilter::default().prescan(&a, &a, &mut StdRng::seed_from_u64(3));
        assert_eq!(r.on_either_count, 0);
        assert_eq!(r.gate_overlap_ratio, 0.0);
    }

    #[test]
    fn budget_skips_trailing_pairs() {
        let config = OverlapConfig {
            max_prescan_pairs: 1,
            prescan_sample_count: 20,
            ..Default::default()
        };
        let a = gated("a", vec![]);
        let pairs = vec![(&a, &a), (&a, &a), (&a, &a)];
        let out = BehavioralPrescanFilter::new(&config).filter_pairs(&pairs, &mut StdRng::seed_from_u64(4));
        assert!(out[0].passed());
        assert_eq!(out[1], PrescanOutcome::Skipped);
        assert_eq!(out[2], PrescanOutcome::Skipped);
    }
}
