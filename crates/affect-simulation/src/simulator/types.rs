//! Result types for Monte Carlo simulation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use affect_types::{SamplingDistribution, SamplingMode, SimulationConfig};

use crate::context::Context;
use crate::evaluator::ClauseType;
use crate::statistics::ConfidenceInterval;

// ── Run Identity ────────────────────────────────────────────────────────

/// Unique identifier for a simulation run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run:{}", self.0)
    }
}

// ── Options ─────────────────────────────────────────────────────────────

/// Per-call simulation options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationOptions {
    pub sample_count: usize,
    pub sampling_mode: SamplingMode,
    pub distribution: SamplingDistribution,
    pub store_samples_for_sensitivity: bool,
    pub sensitivity_sample_limit: usize,
}

impl SimulationOptions {
    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.sampling_mode = mode;
        self
    }

    /// Retain up to `limit` contexts for sensitivity analysis.
    pub fn storing_samples(mut self, limit: usize) -> Self {
        self.store_samples_for_sensitivity = true;
        self.sensitivity_sample_limit = limit;
        self
    }
}

impl From<&SimulationConfig> for SimulationOptions {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            sample_count: config.sample_count,
            sampling_mode: config.sampling_mode,
            distribution: config.distribution,
            store_samples_for_sensitivity: config.store_samples_for_sensitivity,
            sensitivity_sample_limit: config.sensitivity_sample_limit,
        }
    }
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

// ── Clause statistics ───────────────────────────────────────────────────

/// Aggregated outcome of one clause over all successful trials.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseStatistic {
    pub clause_id: String,
    pub description: String,
    pub kind: ClauseType,
    pub depth: usize,
    pub child_ids: Vec<String>,
    pub evaluated_count: usize,
    pub pass_count: usize,
    pub pass_rate: f64,
    /// Failing trials that this leaf alone kept from triggering.
    pub last_mile_fail_count: usize,
    /// Trials where the leaf's variable was undefined.
    pub missing_count: usize,
    pub observed_min: Option<f64>,
    pub observed_max: Option<f64>,
    pub observed_mean: Option<f64>,
    pub threshold: Option<f64>,
    /// Distance from the best observed value to the threshold; positive
    /// means the threshold was never reached.
    pub ceiling_gap: Option<f64>,
}

/// An `and` node with several individually rare children.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverconstrainedConjunction {
    pub clause_id: String,
    pub description: String,
    pub rare_child_ids: Vec<String>,
    pub child_pass_rates: Vec<f64>,
    /// Product of the rare children's pass rates.
    pub naive_joint_probability: f64,
    pub observed_pass_rate: f64,
}

/// A context retained by the reservoir.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredContext {
    pub trial: usize,
    pub triggered: bool,
    pub context: Context,
}

// ── Result ──────────────────────────────────────────────────────────────

/// Outcome of one simulation run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub run_id: RunId,
    pub expression_id: String,
    pub sampling_mode: SamplingMode,
    pub sample_count: usize,
    pub trigger_count: usize,
    pub trigger_rate: f64,
    pub confidence_interval: ConfidenceInterval,
    /// Trials that faulted during evaluation; counted as not triggering.
    pub error_count: usize,
    pub clause_statistics: Vec<ClauseStatistic>,
    pub overconstrained_conjunctions: Vec<OverconstrainedConjunction>,
    pub stored_contexts: Vec<StoredContext>,
    pub completed_at: DateTime<Utc>,
}

impl SimulationResult {
    pub fn clause(&self, clause_id: &str) -> Option<&ClauseStatistic> {
        self.clause_statistics.iter().find(|c| c.clause_id == clause_id)
    }
}
