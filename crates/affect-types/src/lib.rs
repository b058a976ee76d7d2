//! # affect-types
//!
//! Shared vocabulary for the affect diagnostics engine: bounded axis states,
//! validated prototypes and gates, trigger expression trees and the engine
//! configuration.
//!
//! Everything here is plain data, validated once at load time. Sampling and
//! analysis live in `affect-simulation` and `prototype-overlap`.
//!
//! ```rust
//! use affect_types::{AxisState, Gate, Prototype, PrototypeKind};
//!
//! let state = AxisState::from_named([("valence", 40.0), ("threat", -10.0)]).unwrap();
//! assert_eq!(state.get("valence"), Some(40.0));
//!
//! let gate: Gate = "threat <= 0.20".parse().unwrap();
//! let calm = Prototype::new("calm", PrototypeKind::Emotion, [("valence", 0.6)], vec![gate]);
//! assert_eq!(calm.active_axes(0.05), vec!["valence"]);
//! ```

#![deny(unsafe_code)]

pub mod axis;
pub mod config;
pub mod error;
pub mod expression;
pub mod prototype;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use axis::{
    AxisRef, AxisState, MoodAxis, NormalizedAxes, SexualAxis, TraitAxis, TraitState,
    MOOD_AXIS_RANGE, SEXUAL_AROUSAL_AXIS, TRAIT_AXIS_RANGE,
};
pub use config::{
    ClassificationThresholds, ComplexityConfig, DiagnosticsConfig, OverlapConfig,
    SamplingDistribution, SamplingMode, SimulationConfig,
};
pub use error::{ConfigError, ConfigResult, DefinitionError, DefinitionResult};
pub use expression::{
    CompareOperator, Comparison, ExpressionDefinition, ExpressionNode, Operand, Prerequisite,
    MAX_EXPRESSION_DEPTH,
};
pub use prototype::{
    Gate, GateDefinition, GateOperator, Prototype, PrototypeCatalog, PrototypeDefinition,
    PrototypeKind, Weight,
};
