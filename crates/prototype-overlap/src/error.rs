use thiserror::Error;

use affect_types::{ConfigError, DefinitionError, PrototypeKind};

/// Errors from the overlap and complexity analyses.
#[derive(Debug, Error)]
pub enum OverlapError {
    #[error("invalid definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot compare {a} ({a_kind}) with {b} ({b_kind}): prototypes must share a type")]
    KindMismatch {
        a: String,
        a_kind: PrototypeKind,
        b: String,
        b_kind: PrototypeKind,
    },
}

/// Convenience alias for overlap results.
pub type OverlapResult<T> = Result<T, OverlapError>;
