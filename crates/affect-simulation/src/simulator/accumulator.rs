//! Mergeable per-trial accumulators.
//!
//! Trials share nothing but these accumulators, so a run can be split into
//! partitions whose accumulators are summed with `merge`.

use rand::seq::SliceRandom;
use rand::Rng;

use affect_types::CompareOperator;

use crate::error::{EvaluationError, SimResult, SimulationError};
use crate::evaluator::{ClauseKind, CompiledExpression, Evaluation};

use super::types::ClauseStatistic;

/// Running counts for one clause.
#[derive(Clone, Debug, Default, PartialEq)]
struct ClauseTally {
    evaluated: usize,
    passed: usize,
    last_mile_fail: usize,
    missing: usize,
    observed_count: usize,
    observed_sum: f64,
    observed_min: Option<f64>,
    observed_max: Option<f64>,
}

impl ClauseTally {
    fn observe(&mut self, v: f64) {
        self.observed_count += 1;
        self.observed_sum += v;
        self.observed_min = Some(self.observed_min.map_or(v, |m| m.min(v)));
        self.observed_max = Some(self.observed_max.map_or(v, |m| m.max(v)));
    }

    fn merge(&mut self, other: &ClauseTally) {
        self.evaluated += other.evaluated;
        self.passed += other.passed;
        self.last_mile_fail += other.last_mile_fail;
        self.missing += other.missing;
        self.observed_count += other.observed_count;
        self.observed_sum += other.observed_sum;
        self.observed_min = min_opt(self.observed_min, other.observed_min);
        self.observed_max = max_opt(self.observed_max, other.observed_max);
    }
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Totals collected from a finished accumulator.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialSummary {
    pub attempted: usize,
    pub trigger_count: usize,
    pub error_count: usize,
    pub clause_statistics: Vec<ClauseStatistic>,
}

/// Trigger and clause counts for a set of trials.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialAccumulator {
    attempted: usize,
    trigger_count: usize,
    error_count: usize,
    last_error: Option<EvaluationError>,
    tallies: Vec<ClauseTally>,
}

impl TrialAccumulator {
    /// Empty accumulator sized for `compiled`.
    pub fn new(compiled: &CompiledExpression) -> Self {
        Self {
            attempted: 0,
            trigger_count: 0,
            error_count: 0,
            last_error: None,
            tallies: vec![ClauseTally::default(); compiled.len()],
        }
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn trigger_count(&self) -> usize {
        self.trigger_count
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Record a successfully evaluated trial.
    pub fn record(&mut self, compiled: &CompiledExpression, evaluation: &Evaluation) {
        self.attempted += 1;
        if evaluation.passed {
            self.trigger_count += 1;
        }
        for (idx, (tally, outcome)) in self.tallies.iter_mut().zip(&evaluation.outcomes).enumerate() {
            tally.evaluated += 1;
            if outcome.passed {
                tally.passed += 1;
            }
            if outcome.missing {
                tally.missing += 1;
            }
            if let Some(v) = outcome.observed {
                tally.observe(v);
            }
            let is_leaf = matches!(
                compiled.nodes().get(idx).map(|n| &n.kind),
                Some(ClauseKind::Leaf(_))
            );
            if !evaluation.passed
                && is_leaf
                && !outcome.passed
                && compiled
                    .passes_with_flipped(&evaluation.outcomes, idx)
                    .unwrap_or(false)
            {
                tally.last_mile_fail += 1;
            }
        }
    }

    /// Record a trial whose evaluation faulted. It counts as not triggering.
    pub fn record_fault(&mut self, error: EvaluationError) {
        self.attempted += 1;
        self.error_count += 1;
        self.last_error = Some(error);
    }

    /// Fold another partition's counts into this one.
    pub fn merge(&mut self, other: TrialAccumulator) {
        self.attempted += other.attempted;
        self.trigger_count += other.trigger_count;
        self.error_count += other.error_count;
        if other.last_error.is_some() {
            self.last_error = other.last_error;
        }
        if self.tallies.len() < other.tallies.len() {
            self.tallies.resize(other.tallies.len(), ClauseTally::default());
        }
        for (mine, theirs) in self.tallies.iter_mut().zip(&other.tallies) {
            mine.merge(theirs);
        }
    }

    /// Produce per-clause statistics. Fails when trials were attempted and
    /// every one of them faulted.
    pub fn finish(self, compiled: &CompiledExpression) -> SimResult<TrialSummary> {
        if self.attempted > 0 && self.error_count == self.attempted {
            if let Some(last_error) = self.last_error {
                return Err(SimulationError::AllTrialsFailed {
                    attempted: self.attempted,
                    last_error,
                });
            }
        }
        let nodes = compiled.nodes();
        let clause_statistics = nodes
            .iter()
            .zip(&self.tallies)
            .map(|(node, tally)| {
                let threshold = node.threshold();
                let ceiling_gap = match (node.comparison(), threshold) {
                    (Some(cmp), Some(t)) => match cmp.op {
                        CompareOperator::Gte | CompareOperator::Gt => {
                            tally.observed_max.map(|max| t - max)
                        }
                        CompareOperator::Lte | CompareOperator::Lt => {
                            tally.observed_min.map(|min| min - t)
                        }
                        CompareOperator::Eq | CompareOperator::Ne => None,
                    },
                    _ => None,
                };
                ClauseStatistic {
                    clause_id: node.id.clone(),
                    description: node.description.clone(),
                    kind: node.clause_type(),
                    depth: node.depth,
                    child_ids: node.children().iter().map(|&c| nodes[c].id.clone()).collect(),
                    evaluated_count: tally.evaluated,
                    pass_count: tally.passed,
                    pass_rate: ratio(tally.passed, tally.evaluated),
                    last_mile_fail_count: tally.last_mile_fail,
                    missing_count: tally.missing,
                    observed_min: tally.observed_min,
                    observed_max: tally.observed_max,
                    observed_mean: (tally.observed_count > 0)
                        .then(|| tally.observed_sum / tally.observed_count as f64),
                    threshold,
                    ceiling_gap,
                }
            })
            .collect();
        Ok(TrialSummary {
            attempted: self.attempted,
            trigger_count: self.trigger_count,
            error_count: self.error_count,
            clause_statistics,
        })
    }
}

pub(crate) fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

// ── Reservoir ───────────────────────────────────────────────────────────

/// Fixed-capacity uniform sample of a stream (Algorithm R).
#[derive(Clone, Debug, PartialEq)]
pub struct ReservoirSampler<T> {
    capacity: usize,
    seen: usize,
    items: Vec<T>,
}

impl<T> ReservoirSampler<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: 0,
            items: Vec::with_capacity(capacity.min(1024)),
        }
    }

    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Offer one item from the stream.
    pub fn offer<R: Rng + ?Sized>(&mut self, item: T, rng: &mut R) {
        self.seen += 1;
        if self.capacity == 0 {
            return;
        }
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }
        let j = rng.gen_range(0..self.seen);
        if j < self.capacity {
            self.items[j] = item;
        }
    }

    /// Combine two reservoirs over disjoint streams, weighting each side by
    /// the number of items it has seen.
    pub fn merge<R: Rng + ?Sized>(self, other: ReservoirSampler<T>, rng: &mut R) -> Self {
        let capacity = self.capacity.max(other.capacity);
        let seen = self.seen + other.seen;
        let (mut left, mut right) = (self.items, other.items);
        left.shuffle(rng);
        right.shuffle(rng);
        let (mut left_weight, mut right_weight) = (self.seen, other.seen);
        let mut items = Vec::with_capacity(capacity.min(left.len() + right.len()));
        while items.len() < capacity {
            let take_left = match (left.is_empty(), right.is_empty()) {
                (true, true) => break,
                (false, true) => true,
                (true, false) => false,
                (false, false) => rng.gen_range(0..left_weight + right_weight) < left_weight,
            };
            let next = if take_left {
                left_weight = left_weight.saturating_sub(1).max(1);
                left.pop()
            } else {
                right_weight = right_weight.saturating_sub(1).max(1);
                right.pop()
            };
            if let Some(item) = next {
                items.push(item);
            }
        }
        Self {
            capacity,
            seen,
            items,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
