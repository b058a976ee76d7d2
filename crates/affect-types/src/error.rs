use thiserror::Error;

/// Errors raised while loading or validating affect definitions.
///
/// These are surfaced synchronously, before any sampling starts.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("axis {axis} value {value} outside declared range [{min}, {max}]")]
    AxisOutOfRange {
        axis: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("unknown axis: {0}")]
    UnknownAxis(String),

    #[error("prototype {0} has no weights")]
    MissingWeights(String),

    #[error("invalid gate `{gate}`: {reason}")]
    InvalidGate { gate: String, reason: String },

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("duplicate prototype id: {0}")]
    DuplicatePrototype(String),

    #[error("malformed definition: {0}")]
    Malformed(String),

    #[error("expression {id}: {reason}")]
    MalformedExpression { id: String, reason: String },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("configuration parse error: {0}")]
    Parse(String),

    #[error("configuration io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience alias for definition loading results.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_names_axis_and_bounds() {
        let e = DefinitionError::AxisOutOfRange {
            axis: "valence".into(),
            value: 140.0,
            min: -100.0,
            max: 100.0,
        };
        let msg = e.to_string();
        assert!(msg.contains("valence"));
        assert!(msg.contains("140"));
        assert!(msg.contains("-100"));
    }

    #[test]
    fn config_error_names_field() {
        let e = ConfigError::invalid("prescanSampleCount", "must be > 0");
        assert!(e.to_string().contains("prescanSampleCount"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ConfigError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }
}
