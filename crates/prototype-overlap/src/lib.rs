//! # prototype-overlap
//!
//! Redundancy and complexity diagnostics for a prototype catalog.
//!
//! Pairs of same-type prototypes are screened three ways before the costly
//! behavioral comparison: Stage A weight similarity, deterministic gate
//! implication (Route B) and a bounded gate co-occurrence prescan (Route C).
//! Admitted pairs are sampled jointly and classified as merge candidates,
//! subsumptions, expression conversions or nested siblings.
//!
//! [`PrototypeComplexityAnalyzer`] looks at the population as a whole:
//! active-axis counts, outliers and recurring axis bundles.
//!
//! ```rust
//! use affect_types::{Prototype, PrototypeKind};
//! use prototype_overlap::{GateImplicationEvaluator, GateRelation};
//!
//! let joy = Prototype::new("joy", PrototypeKind::Emotion, [("valence", 1.0)],
//!     vec!["valence >= 0.2".parse().unwrap()]);
//! let calm_joy = Prototype::new("calm_joy", PrototypeKind::Emotion, [("valence", 1.0)],
//!     vec!["valence >= 0.2".parse().unwrap(), "threat <= 0.2".parse().unwrap()]);
//!
//! let r = GateImplicationEvaluator::new().evaluate(&calm_joy, &joy);
//! assert_eq!(r.relation, GateRelation::Narrower);
//! ```

#![deny(unsafe_code)]

pub mod behavior;
pub mod candidate;
pub mod classifier;
pub mod complexity;
pub mod error;
pub mod implication;
pub mod pipeline;
pub mod prescan;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use behavior::{BehaviorMetrics, BehavioralOverlapEvaluator};
pub use candidate::{CandidateMetrics, CandidateMetricsScorer, CandidatePair};
pub use classifier::{
    Evidence, MatchingClassification, OverlapClassification, OverlapClassifier, OverlapType,
    CONVERT_MAX_THREAT_UPPER,
};
pub use complexity::{
    AxisBundle, ComplexityAnalysis, ComplexityOutlier, ComplexityOutliers, PrototypeComplexity,
    PrototypeComplexityAnalyzer, Recommendation, RecommendationKind,
};
pub use error::{OverlapError, OverlapResult};
pub use implication::{
    gate_intervals, AxisComparison, AxisInterval, Bound, GateImplicationEvaluator,
    GateImplicationResult, GateRelation,
};
pub use pipeline::{
    OverlapCounts, OverlapPipeline, OverlapReport, PairReport, Route, SkipReason, SkippedPair,
};
pub use prescan::{BehavioralPrescanFilter, PrescanOutcome, PrescanResult};
