//! # affect-simulation
//!
//! Monte Carlo diagnostics for affect trigger expressions.
//!
//! A run samples temporal pairs of axis states, projects them through the
//! prototype catalog into a [`Context`], evaluates the compiled expression
//! with full clause attribution and aggregates trigger rates, Wilson
//! intervals and per-clause statistics.
//!
//! ```text
//!   TemporalStateGenerator ─► ContextBuilder ─► ExpressionEvaluator
//!             ▲                                        │
//!             │ rng                                    ▼
//!   MonteCarloSimulator ◄──────────────── TrialAccumulator (+ reservoir)
//!             │
//!             ▼
//!   SimulationResult ─► SensitivityAnalyzer / check_integrity
//! ```
//!
//! The crate logs through `tracing` and installs no subscriber.

#![deny(unsafe_code)]

pub mod context;
pub mod error;
pub mod evaluator;
pub mod sensitivity;
pub mod simulator;
pub mod statistics;
pub mod temporal;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use context::{Context, ContextBuilder, ContextGroup, PrototypeEvaluation};
pub use error::{EvaluationError, SimResult, SimulationError};
pub use evaluator::{
    ClauseAttribution, ClauseKind, ClauseNode, ClauseOutcome, ClauseType, CompiledExpression,
    Evaluation, ExpressionEvaluator, ResolvedValue, VariableResolver,
};
pub use sensitivity::{
    check_integrity, IntegrityReport, IntegrityViolation, SensitivityAnalyzer, SensitivityPoint,
    SensitivitySweep, TimePoint, ViolationKind,
};
pub use simulator::{
    detect_overconstrained_conjunctions, rank_last_mile_blockers, ClauseStatistic,
    MonteCarloSimulator, OverconstrainedConjunction, PartialRun, ReservoirSampler, RunId,
    SimulationOptions, SimulationResult, StoredContext, TrialAccumulator, TrialSummary,
};
pub use statistics::{
    compute_distribution_stats, detect_outliers, get_nested_value, histogram,
    pearson_correlation, percentile, quartiles, wilson_interval, ConfidenceInterval,
    DistributionStats, Outliers, Quartiles,
};
pub use temporal::{standard_normal, DeltaProfile, TemporalPair, TemporalStateGenerator};
