//! Diagnostics configuration.
//!
//! Every knob the engine exposes lives here, grouped by the component that
//! reads it. Files use TOML with camelCase keys:
//!
//! ```toml
//! [simulation]
//! sampleCount = 20000
//! samplingMode = "dynamic"
//!
//! [overlap]
//! prescanSampleCount = 400
//!
//! [classification]
//! enableConvertToExpression = false
//!
//! [complexity]
//! minBundleSupport = 0.25
//! ```
//!
//! Missing sections and keys fall back to the `DEFAULT_*` constants below.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Trials per simulation.
pub const DEFAULT_SAMPLE_COUNT: usize = 10_000;
/// Retained contexts when sensitivity storage is enabled.
pub const DEFAULT_SENSITIVITY_SAMPLE_LIMIT: usize = 10;
/// Per-trial delta std-dev for mood axes (raw units, range [-100, 100]).
pub const DEFAULT_MOOD_DELTA_STD_DEV: f64 = 15.0;
/// Per-trial delta std-dev for sexual axes (raw units). Larger than mood so
/// sexual-state gates get crossed between instants.
pub const DEFAULT_SEXUAL_DELTA_STD_DEV: f64 = 20.0;
/// z for a 95% two-sided interval.
pub const DEFAULT_CONFIDENCE_Z: f64 = 1.96;

pub const DEFAULT_OVERCONSTRAINED_MIN_CHILDREN: usize = 3;
pub const DEFAULT_OVERCONSTRAINED_MAX_CHILD_PASS_RATE: f64 = 0.10;

pub const DEFAULT_ACTIVE_WEIGHT_EPSILON: f64 = 0.05;
pub const DEFAULT_CANDIDATE_MIN_ACTIVE_AXIS_OVERLAP: f64 = 0.6;
pub const DEFAULT_CANDIDATE_MIN_SIGN_AGREEMENT: f64 = 0.8;
pub const DEFAULT_CANDIDATE_MIN_COSINE_SIMILARITY: f64 = 0.85;
pub const DEFAULT_PRESCAN_SAMPLE_COUNT: usize = 500;
pub const DEFAULT_PRESCAN_MIN_GATE_OVERLAP: f64 = 0.5;
pub const DEFAULT_MAX_PRESCAN_PAIRS: usize = 1_000;
pub const DEFAULT_BEHAVIOR_SAMPLE_COUNT: usize = 4_000;

pub const DEFAULT_MIN_ON_EITHER_RATE_FOR_MERGE: f64 = 0.05;
pub const DEFAULT_MIN_GATE_OVERLAP_RATIO: f64 = 0.9;
pub const DEFAULT_MIN_CORRELATION_FOR_MERGE: f64 = 0.98;
pub const DEFAULT_MAX_MEAN_ABS_DIFF_FOR_MERGE: f64 = 0.03;
pub const DEFAULT_MAX_EXCLUSIVE_RATE_FOR_SUBSUMPTION: f64 = 0.01;
pub const DEFAULT_MIN_CORRELATION_FOR_SUBSUMPTION: f64 = 0.95;
pub const DEFAULT_MIN_DOMINANCE_FOR_SUBSUMPTION: f64 = 0.95;
pub const DEFAULT_MIN_CONDITIONAL_FOR_NESTING: f64 = 0.97;
pub const DEFAULT_MAX_REVERSE_CONDITIONAL_FOR_NESTING: f64 = 0.8;

pub const DEFAULT_MIN_BUNDLE_SUPPORT: f64 = 0.2;
pub const DEFAULT_HIGH_BUNDLE_SUPPORT: f64 = 0.4;
pub const DEFAULT_MIN_BUNDLE_SIZE: usize = 2;
pub const DEFAULT_MAX_BUNDLE_SIZE: usize = 4;
/// Bundles at least this large may suggest a composite axis.
pub const DEFAULT_LARGE_BUNDLE_SIZE: usize = 3;
pub const DEFAULT_OUTLIER_STD_DEV_THRESHOLD: f64 = 2.0;
pub const DEFAULT_MIN_PROTOTYPES_FOR_ANALYSIS: usize = 5;

// ── Sampling ────────────────────────────────────────────────────────────

/// How `current` relates to `previous` within a temporal pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// `current` is drawn independently of `previous`.
    #[default]
    Static,
    /// `current = clamp(previous + gaussian delta)`.
    Dynamic,
}

/// Marginal law used to draw `previous`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SamplingDistribution {
    /// Uniform over each axis's range.
    #[default]
    Uniform,
    /// Gaussian centred on the range midpoint; `spread` is the std-dev as a
    /// fraction of the half-range. Clamped into range.
    Gaussian { spread: f64 },
}

// ── Sections ────────────────────────────────────────────────────────────

/// Monte Carlo simulation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub sample_count: usize,
    pub sampling_mode: SamplingMode,
    pub distribution: SamplingDistribution,
    pub store_samples_for_sensitivity: bool,
    pub sensitivity_sample_limit: usize,
    /// Fixed seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
    pub mood_delta_std_dev: f64,
    pub sexual_delta_std_dev: f64,
    pub confidence_z: f64,
    pub overconstrained_min_children: usize,
    pub overconstrained_max_child_pass_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            sampling_mode: SamplingMode::Static,
            distribution: SamplingDistribution::Uniform,
            store_samples_for_sensitivity: false,
            sensitivity_sample_limit: DEFAULT_SENSITIVITY_SAMPLE_LIMIT,
            seed: None,
            mood_delta_std_dev: DEFAULT_MOOD_DELTA_STD_DEV,
            sexual_delta_std_dev: DEFAULT_SEXUAL_DELTA_STD_DEV,
            confidence_z: DEFAULT_CONFIDENCE_Z,
            overconstrained_min_children: DEFAULT_OVERCONSTRAINED_MIN_CHILDREN,
            overconstrained_max_child_pass_rate: DEFAULT_OVERCONSTRAINED_MAX_CHILD_PASS_RATE,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.mood_delta_std_dev.is_finite() && self.mood_delta_std_dev > 0.0) {
            return Err(ConfigError::invalid("moodDeltaStdDev", "must be finite and > 0"));
        }
        if !(self.sexual_delta_std_dev.is_finite() && self.sexual_delta_std_dev > 0.0) {
            return Err(ConfigError::invalid("sexualDeltaStdDev", "must be finite and > 0"));
        }
        if !(self.confidence_z.is_finite() && self.confidence_z > 0.0) {
            return Err(ConfigError::invalid("confidenceZ", "must be finite and > 0"));
        }
        if let SamplingDistribution::Gaussian { spread } = self.distribution {
            if !(spread.is_finite() && spread > 0.0) {
                return Err(ConfigError::invalid("distribution.spread", "must be finite and > 0"));
            }
        }
        if self.overconstrained_min_children < 2 {
            return Err(ConfigError::invalid("overconstrainedMinChildren", "must be >= 2"));
        }
        check_unit("overconstrainedMaxChildPassRate", self.overconstrained_max_child_pass_rate)
    }
}

/// Candidate selection and behavioral sampling for prototype pairs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlapConfig {
    pub active_weight_epsilon: f64,
    pub candidate_min_active_axis_overlap: f64,
    pub candidate_min_sign_agreement: f64,
    pub candidate_min_cosine_similarity: f64,
    pub prescan_sample_count: usize,
    pub prescan_min_gate_overlap: f64,
    pub max_prescan_pairs: usize,
    pub behavior_sample_count: usize,
    pub seed: Option<u64>,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            active_weight_epsilon: DEFAULT_ACTIVE_WEIGHT_EPSILON,
            candidate_min_active_axis_overlap: DEFAULT_CANDIDATE_MIN_ACTIVE_AXIS_OVERLAP,
            candidate_min_sign_agreement: DEFAULT_CANDIDATE_MIN_SIGN_AGREEMENT,
            candidate_min_cosine_similarity: DEFAULT_CANDIDATE_MIN_COSINE_SIMILARITY,
            prescan_sample_count: DEFAULT_PRESCAN_SAMPLE_COUNT,
            prescan_min_gate_overlap: DEFAULT_PRESCAN_MIN_GATE_OVERLAP,
            max_prescan_pairs: DEFAULT_MAX_PRESCAN_PAIRS,
            behavior_sample_count: DEFAULT_BEHAVIOR_SAMPLE_COUNT,
            seed: None,
        }
    }
}

impl OverlapConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.active_weight_epsilon.is_finite() && self.active_weight_epsilon >= 0.0) {
            return Err(ConfigError::invalid("activeWeightEpsilon", "must be finite and >= 0"));
        }
        check_unit("candidateMinActiveAxisOverlap", self.candidate_min_active_axis_overlap)?;
        check_unit("candidateMinSignAgreement", self.candidate_min_sign_agreement)?;
        if !(-1.0..=1.0).contains(&self.candidate_min_cosine_similarity) {
            return Err(ConfigError::invalid("candidateMinCosineSimilarity", "must be in [-1, 1]"));
        }
        if self.prescan_sample_count == 0 {
            return Err(ConfigError::invalid("prescanSampleCount", "must be > 0"));
        }
        check_unit("prescanMinGateOverlap", self.prescan_min_gate_overlap)?;
        if self.behavior_sample_count == 0 {
            return Err(ConfigError::invalid("behaviorSampleCount", "must be > 0"));
        }
        Ok(())
    }
}

/// Thresholds for the overlap classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassificationThresholds {
    pub min_on_either_rate_for_merge: f64,
    pub min_gate_overlap_ratio: f64,
    pub min_correlation_for_merge: f64,
    pub max_mean_abs_diff_for_merge: f64,
    pub max_exclusive_rate_for_subsumption: f64,
    pub min_correlation_for_subsumption: f64,
    pub min_dominance_for_subsumption: f64,
    pub enable_convert_to_expression: bool,
    pub min_conditional_for_nesting: f64,
    pub max_reverse_conditional_for_nesting: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            min_on_either_rate_for_merge: DEFAULT_MIN_ON_EITHER_RATE_FOR_MERGE,
            min_gate_overlap_ratio: DEFAULT_MIN_GATE_OVERLAP_RATIO,
            min_correlation_for_merge: DEFAULT_MIN_CORRELATION_FOR_MERGE,
            max_mean_abs_diff_for_merge: DEFAULT_MAX_MEAN_ABS_DIFF_FOR_MERGE,
            max_exclusive_rate_for_subsumption: DEFAULT_MAX_EXCLUSIVE_RATE_FOR_SUBSUMPTION,
            min_correlation_for_subsumption: DEFAULT_MIN_CORRELATION_FOR_SUBSUMPTION,
            min_dominance_for_subsumption: DEFAULT_MIN_DOMINANCE_FOR_SUBSUMPTION,
            enable_convert_to_expression: true,
            min_conditional_for_nesting: DEFAULT_MIN_CONDITIONAL_FOR_NESTING,
            max_reverse_conditional_for_nesting: DEFAULT_MAX_REVERSE_CONDITIONAL_FOR_NESTING,
        }
    }
}

impl ClassificationThresholds {
    pub fn validate(&self) -> ConfigResult<()> {
        check_unit("minOnEitherRateForMerge", self.min_on_either_rate_for_merge)?;
        check_unit("minGateOverlapRatio", self.min_gate_overlap_ratio)?;
        check_correlation("minCorrelationForMerge", self.min_correlation_for_merge)?;
        check_unit("maxMeanAbsDiffForMerge", self.max_mean_abs_diff_for_merge)?;
        check_unit("maxExclusiveRateForSubsumption", self.max_exclusive_rate_for_subsumption)?;
        check_correlation("minCorrelationForSubsumption", self.min_correlation_for_subsumption)?;
        check_unit("minDominanceForSubsumption", self.min_dominance_for_subsumption)?;
        check_unit("minConditionalForNesting", self.min_conditional_for_nesting)?;
        check_unit("maxReverseConditionalForNesting", self.max_reverse_conditional_for_nesting)?;
        if self.max_reverse_conditional_for_nesting >= self.min_conditional_for_nesting {
            return Err(ConfigError::invalid(
                "maxReverseConditionalForNesting",
                "must be below minConditionalForNesting",
            ));
        }
        Ok(())
    }
}

/// Population complexity analysis settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComplexityConfig {
    pub active_weight_epsilon: f64,
    pub min_bundle_support: f64,
    pub high_bundle_support: f64,
    pub min_bundle_size: usize,
    pub max_bundle_size: usize,
    pub large_bundle_size: usize,
    /// Drop bundles that have a superset with the same frequency.
    pub closed_bundles_only: bool,
    pub outlier_std_dev_threshold: f64,
    pub min_prototypes_for_analysis: usize,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            active_weight_epsilon: DEFAULT_ACTIVE_WEIGHT_EPSILON,
            min_bundle_support: DEFAULT_MIN_BUNDLE_SUPPORT,
            high_bundle_support: DEFAULT_HIGH_BUNDLE_SUPPORT,
            min_bundle_size: DEFAULT_MIN_BUNDLE_SIZE,
            max_bundle_size: DEFAULT_MAX_BUNDLE_SIZE,
            large_bundle_size: DEFAULT_LARGE_BUNDLE_SIZE,
            closed_bundles_only: false,
            outlier_std_dev_threshold: DEFAULT_OUTLIER_STD_DEV_THRESHOLD,
            min_prototypes_for_analysis: DEFAULT_MIN_PROTOTYPES_FOR_ANALYSIS,
        }
    }
}

impl ComplexityConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.active_weight_epsilon.is_finite() && self.active_weight_epsilon >= 0.0) {
            return Err(ConfigError::invalid("activeWeightEpsilon", "must be finite and >= 0"));
        }
        check_unit("minBundleSupport", self.min_bundle_support)?;
        check_unit("highBundleSupport", self.high_bundle_support)?;
        if self.min_bundle_size < 2 {
            return Err(ConfigError::invalid("minBundleSize", "must be >= 2"));
        }
        if self.max_bundle_size < self.min_bundle_size {
            return Err(ConfigError::invalid("maxBundleSize", "must be >= minBundleSize"));
        }
        if self.large_bundle_size < 2 {
            return Err(ConfigError::invalid("largeBundleSize", "must be >= 2"));
        }
        if !(self.outlier_std_dev_threshold.is_finite() && self.outlier_std_dev_threshold > 0.0) {
            return Err(ConfigError::invalid("outlierStdDevThreshold", "must be finite and > 0"));
        }
        Ok(())
    }
}

// ── Root ────────────────────────────────────────────────────────────────

/// All engine configuration. Read-only once constructed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagnosticsConfig {
    pub simulation: SimulationConfig,
    pub overlap: OverlapConfig,
    pub classification: ClassificationThresholds,
    pub complexity: ComplexityConfig,
}

impl DiagnosticsConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()?;
        self.overlap.validate()?;
        self.classification.validate()?;
        self.complexity.validate()
    }
}

fn check_unit(field: &'static str, value: f64) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(field, format!("{} not in [0, 1]", value)));
    }
    Ok(())
}

fn check_correlation(field: &'static str, value: f64) -> ConfigResult<()> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(field, format!("{} not in [-1, 1]", value)));
    }
    Ok(())
}
