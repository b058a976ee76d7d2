//! Stage A: cheap weight-vector similarity between two prototypes.

use std::collections::BTreeSet;

use serde::Serialize;

use affect_types::{OverlapConfig, Prototype};

/// Weight-space similarity of a prototype pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMetrics {
    /// |shared| / |union| of active axes.
    pub active_axis_overlap: f64,
    /// Fraction of shared active axes whose weights have the same sign.
    pub sign_agreement: f64,
    /// Cosine of the full weight vectors, zero-padded to the union of weighted axes.
    pub weight_cosine_similarity: f64,
    pub shared_active_axes: Vec<String>,
    pub union_active_axes: Vec<String>,
}

/// A same-type prototype pair with its Stage A metrics.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePair {
    pub a_id: String,
    pub b_id: String,
    pub metrics: CandidateMetrics,
}

#[derive(Clone, Debug)]
pub struct CandidateMetricsScorer {
    active_weight_epsilon: f64,
    min_active_axis_overlap: f64,
    min_sign_agreement: f64,
    min_cosine_similarity: f64,
}

impl CandidateMetricsScorer {
    pub fn new(config: &OverlapConfig) -> Self {
        Self {
            active_weight_epsilon: config.active_weight_epsilon,
            min_active_axis_overlap: config.candidate_min_active_axis_overlap,
            min_sign_agreement: config.candidate_min_sign_agreement,
            min_cosine_similarity: config.candidate_min_cosine_similarity,
        }
    }

    pub fn score(&self, a: &Prototype, b: &Prototype) -> CandidateMetrics {
        let eps = self.active_weight_epsilon;
        let active_a: BTreeSet<&str> = a.active_axes(eps).into_iter().collect();
        let active_b: BTreeSet<&str> = b.active_axes(eps).into_iter().collect();
        let shared: Vec<&str> = active_a.intersection(&active_b).copied().collect();
        let union: Vec<&str> = active_a.union(&active_b).copied().collect();

        let active_axis_overlap = if union.is_empty() {
            0.0
        } else {
            shared.len() as f64 / union.len() as f64
        };

        let sign_agreement = if shared.is_empty() {
            0.0
        } else {
            let agreeing = shared
                .iter()
                .filter(|axis| a.weight(axis).signum() == b.weight(axis).signum())
                .count();
            agreeing as f64 / shared.len() as f64
        };

        let weighted: BTreeSet<&str> = a
            .weights
            .iter()
            .chain(&b.weights)
            .map(|w| w.axis.as_str())
            .collect();
        let weight_cosine_similarity = cosine(
            weighted.iter().map(|axis| finite_or_zero(a.weight(axis))),
            weighted.iter().map(|axis| finite_or_zero(b.weight(axis))),
        );

        CandidateMetrics {
            active_axis_overlap,
            sign_agreement,
            weight_cosine_similarity,
            shared_active_axes: shared.iter().map(|s| s.to_string()).collect(),
            union_active_axes: union.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether the pair clears every Stage A threshold.
    pub fn passes(&self, metrics: &CandidateMetrics) -> bool {
        metrics.active_axis_overlap >= self.min_active_axis_overlap
            && metrics.sign_agreement >= self.min_sign_agreement
            && metrics.weight_cosine_similarity >= self.min_cosine_similarity
    }

    /// Score a pair and wrap it with its ids.
    pub fn candidate(&self, a: &Prototype, b: &Prototype) -> CandidatePair {
        CandidatePair {
            a_id: a.id.clone(),
            b_id: b.id.clone(),
            metrics: self.score(a, b),
        }
    }
}

impl Default for CandidateMetricsScorer {
    fn default() -> Self {
        Self::new(&OverlapConfig::default())
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn cosine(xs: impl Iterator<Item = f64>, ys: impl Iterator<Item = f64>) -> f64 {
    let (mut dot, mut nx, mut ny) = (0.0, 0.0, 0.0);
    for (x, y) in xs.zip(ys) {
        dot += x * y;
        nx += x * x;
        ny += y * y;
    }
    if nx == 0.0 || ny == 0.0 {
        return 0.0;
    }
    dot / (nx.sqrt() * ny.sqrt())
}
