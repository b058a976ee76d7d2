//! Behavioral overlap of a prototype pair over sampled states.

use rand::Rng;
use serde::Serialize;

use affect_simulation::{pearson_correlation, ContextBuilder, TemporalStateGenerator};
use affect_types::{NormalizedAxes, OverlapConfig, Prototype, SamplingDistribution};

use crate::implication::GateImplicationResult;

/// Co-occurrence and intensity agreement of two prototypes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorMetrics {
    pub sample_count: usize,
    pub on_either_rate: f64,
    pub on_both_rate: f64,
    pub a_only_rate: f64,
    pub b_only_rate: f64,
    /// onBoth / onEither.
    pub gate_overlap_ratio: f64,
    /// Intensity correlation over samples where both gates pass.
    pub pearson: Option<f64>,
    pub mean_abs_diff: f64,
    /// Fraction of joint samples where A's intensity is at least B's.
    pub dominance_a: f64,
    pub dominance_b: f64,
    pub p_a_given_b: Option<f64>,
    pub p_b_given_a: Option<f64>,
    pub implication: GateImplicationResult,
}

impl BehaviorMetrics {
    pub fn pearson_or_zero(&self) -> f64 {
        self.pearson.unwrap_or(0.0)
    }
}

#[derive(Clone, Debug)]
pub struct BehavioralOverlapEvaluator {
    sample_count: usize,
    generator: TemporalStateGenerator,
}

impl BehavioralOverlapEvaluator {
    pub fn new(config: &OverlapConfig) -> Self {
        Self {
            sample_count: config.behavior_sample_count,
            generator: TemporalStateGenerator::default(),
        }
    }

    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        a: &Prototype,
        b: &Prototype,
        implication: GateImplicationResult,
        rng: &mut R,
    ) -> BehaviorMetrics {
        let (mut both, mut a_only, mut b_only) = (0usize, 0usize, 0usize);
        let mut joint_a = Vec::new();
        let mut joint_b = Vec::new();

        for _ in 0..self.sample_count {
            let state = self.generator.sample_state(SamplingDistribution::Uniform, rng);
            let traits = self.generator.sample_traits(rng);
            let axes = NormalizedAxes::from_state(&state, &traits);
            let ea = ContextBuilder::evaluate_prototype(a, &axes);
            let eb = ContextBuilder::evaluate_prototype(b, &axes);
            match (ea.gate_pass, eb.gate_pass) {
                (true, true) => {
                    both += 1;
                    joint_a.push(ea.intensity);
                    joint_b.push(eb.intensity);
                }
                (true, false) => a_only += 1,
                (false, true) => b_only += 1,
                (false, false) => {}
            }
        }

        let n = self.sample_count;
        let either = both + a_only + b_only;
        let rate = |k: usize| if n == 0 { 0.0 } else { k as f64 / n as f64 };
        let conditional = |k: usize, given: usize| (given > 0).then(|| k as f64 / given as f64);

        let joint = joint_a.len();
        let (mean_abs_diff, dominance_a, dominance_b) = if joint == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let mut diff = 0.0;
            let (mut dom_a, mut dom_b) = (0usize, 0usize);
            for (x, y) in joint_a.iter().zip(&joint_b) {
                diff += (x - y).abs();
                if x >= y {
                    dom_a += 1;
                }
                if y >= x {
                    dom_b += 1;
                }
            }
            let j = joint as f64;
            (diff / j, dom_a as f64 / j, dom_b as f64 / j)
        };

        BehaviorMetrics {
            sample_count: n,
            on_either_rate: rate(either),
            on_both_rate: rate(both),
            a_only_rate: rate(a_only),
            b_only_rate: rate(b_only),
            gate_overlap_ratio: if either == 0 {
                0.0
            } else {
                both as f64 / either as f64
            },
            pearson: identical_or_pearson(&joint_a, &joint_b),
            mean_abs_diff,
            dominance_a,
            dominance_b,
            p_a_given_b: conditional(both, both + b_only),
            p_b_given_a: conditional(both, both + a_only),
            implication,
        }
    }
}

impl Default for BehavioralOverlapEvaluator {
    fn default() -> Self {
        Self::new(&OverlapConfig::default())
    }
}

/// Identical non-empty series correlate perfectly even when constant.
fn identical_or_pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if !xs.is_empty() && xs == ys {
        return Some(1.0);
    }
    pearson_correlation(xs, ys)
}
