use thiserror::Error;

/// Errors raised while building a workload from its configuration.
///
/// These are fatal at startup and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The weights of a choice point sum to zero, so no label can ever be drawn.
    #[error("weighted choice has no positive total weight")]
    NonPositiveTotalWeight,

    /// A single weight is negative or not a finite number.
    #[error("invalid weight {weight} for `{label}`")]
    InvalidWeight {
        /// Debug rendering of the label the weight was given for.
        label: String,
        /// The rejected weight.
        weight: f64,
    },

    /// A configuration option holds a value outside of its valid range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the configuration option.
        field: &'static str,
        /// Human readable description of the constraint.
        reason: String,
    },

    /// A random distribution could not be constructed from its parameters.
    #[error("invalid distribution: {0}")]
    Distribution(String),
}

/// Result type for workload construction.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
