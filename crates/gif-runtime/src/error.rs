//! Error types for the GIF runtime

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while simulating or fitting a GIF model
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Kernel error
    #[error("Filter error: {source}")]
    Filter {
        #[from]
        /// Source filter error
        source: gif_filter::FilterError,
    },

    /// Trace or experiment error
    #[error("Trace error: {source}")]
    Trace {
        #[from]
        /// Source trace error
        source: gif_trace::TraceError,
    },

    /// Invalid fitting configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Reason for invalid configuration
        reason: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// No training trace is flagged for use
    #[error("No usable training traces")]
    NoUsableTraces,

    /// A fitting stage needs spikes and found none
    #[error("No spikes available for the {stage} stage")]
    NoSpikes {
        /// Fitting stage that failed
        stage: String,
    },

    /// Linear system could not be solved
    #[error("Singular matrix in {context}")]
    SingularMatrix {
        /// Where the solve happened
        context: String,
    },

    /// Numerical computation error
    #[error("Numerical error: {reason}")]
    NumericalError {
        /// Reason for numerical error
        reason: String,
    },
}

impl RuntimeError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create a missing-spikes error for a fitting stage
    pub fn no_spikes(stage: impl Into<String>) -> Self {
        Self::NoSpikes {
            stage: stage.into(),
        }
    }

    /// Create a singular matrix error
    pub fn singular_matrix(context: impl Into<String>) -> Self {
        Self::SingularMatrix {
            context: context.into(),
        }
    }

    /// Create a numerical error
    pub fn numerical_error(reason: impl Into<String>) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }
}
