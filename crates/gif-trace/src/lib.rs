//! Recorded traces and experiments for GIF model fitting
//!
//! This crate holds the data side of the fitting workflow: single recorded
//! episodes of injected current and membrane voltage ([`Trace`]), groups of
//! them split into training and test sets ([`Experiment`]), and the
//! [`Recording`] trait through which the fitting pipeline reads them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use gif_filter::time_to_index;

pub mod error;
pub mod experiment;
pub mod trace;
pub mod traits;

pub use error::{Result, TraceError};
pub use experiment::Experiment;
pub use trace::Trace;
pub use traits::{Recording, SpikeTriggeredAverage};

/// Window kept before each spike by the spike-triggered average (ms)
pub const STA_BEFORE_MS: f64 = 10.0;

/// Window kept after each spike by the spike-triggered average (ms)
pub const STA_AFTER_MS: f64 = 20.0;

/// Default voltage threshold for spike detection (mV)
pub const DEFAULT_SPIKE_THRESHOLD: f64 = 0.0;

/// Default dead time after a detected spike (ms)
pub const DEFAULT_DETECTION_REFRACTORY: f64 = 3.0;
