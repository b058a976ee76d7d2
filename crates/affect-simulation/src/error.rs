use thiserror::Error;

use affect_types::{ConfigError, DefinitionError};

/// Fault raised while evaluating one expression against one context.
///
/// The simulator absorbs these per trial; they never abort a run on their own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("non-finite value {value} at `{path}`")]
    NonFiniteValue { path: String, value: f64 },

    #[error("clause index {0} out of bounds")]
    ClauseOutOfBounds(usize),

    #[error("expression depth {depth} exceeds limit {limit}")]
    DepthExceeded { depth: usize, limit: usize },
}

/// Errors from the simulation subsystem.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("every trial failed ({attempted} attempted): {last_error}")]
    AllTrialsFailed {
        attempted: usize,
        last_error: EvaluationError,
    },

    #[error("unknown clause: {0}")]
    UnknownClause(String),

    #[error("clause {clause_id} cannot be swept: {reason}")]
    InvalidClause { clause_id: String, reason: String },
}

/// Convenience alias for simulation results.
pub type SimResult<T> = Result<T, SimulationError>;
