//! Error types for traces and experiments

use thiserror::Error;

/// Result type for trace operations
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors that can occur while building traces and experiments
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    /// Voltage and current arrays differ in length
    #[error("Voltage has {voltage} samples but current has {current}")]
    LengthMismatch {
        /// Number of voltage samples
        voltage: usize,
        /// Number of current samples
        current: usize,
    },

    /// Sampling interval is not a positive finite number
    #[error("Invalid sampling interval: {dt} ms")]
    InvalidDt {
        /// Offending interval
        dt: f64,
    },

    /// Spike index outside the trace
    #[error("Spike at sample {index} outside trace of {len} samples")]
    SpikeOutOfRange {
        /// Spike sample index
        index: usize,
        /// Trace length
        len: usize,
    },

    /// Spike time that is negative or not finite
    #[error("Invalid spike time: {time} ms")]
    InvalidSpikeTime {
        /// Offending time (ms)
        time: f64,
    },

    /// Trace sampled at a different interval than its experiment
    #[error("Trace sampled at {got} ms, experiment uses {expected} ms")]
    DtMismatch {
        /// Experiment sampling interval
        expected: f64,
        /// Trace sampling interval
        got: f64,
    },

    /// Region-of-interest interval with end before start
    #[error("Invalid region of interest [{start}, {end}) ms")]
    InvalidInterval {
        /// Interval start (ms)
        start: f64,
        /// Interval end (ms)
        end: f64,
    },
}
