//! Error types for kernels

use thiserror::Error;

/// Result type for kernel operations
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors that can occur when building or updating a kernel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Wrong number of coefficients
    #[error("Expected {expected} coefficients, got {got}")]
    CoefficientCount {
        /// Number of basis functions
        expected: usize,
        /// Number of coefficients supplied
        got: usize,
    },

    /// NaN or infinite coefficient
    #[error("Coefficient {index} is not finite: {value}")]
    NonFinite {
        /// Position of the offending coefficient
        index: usize,
        /// Offending value
        value: f64,
    },

    /// Invalid basis parameter
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },
}

impl FilterError {
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
}
