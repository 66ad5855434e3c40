//! Spike-triggered kernels for generalized integrate-and-fire models
//!
//! A kernel is a time-dependent function expanded as a linear combination of
//! fixed basis functions. The model only ever sees it through the [`Filter`]
//! trait: sampled at the simulation step, coefficients set from a fit, and
//! turned into a per-sample design matrix against a spike train.

#![warn(missing_docs)]
#![warn(clippy::all)]

use nalgebra::DMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod rect;

pub use error::{FilterError, Result};
pub use rect::RectLogSpacedFilter;

/// Convert a time (ms) to a sample index at step `dt` (ms).
///
/// Rounds to the nearest sample. Every crate in the workspace goes through
/// this function so spike indices agree between simulation and fitting.
pub fn time_to_index(time_ms: f64, dt: f64) -> usize {
    (time_ms / dt).round().max(0.0) as usize
}

/// A kernel sampled on a regular grid
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InterpolatedKernel {
    /// Sample times (ms), starting at zero
    pub support: Vec<f64>,
    /// Kernel value at each sample
    pub values: Vec<f64>,
}

impl InterpolatedKernel {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the kernel has no samples
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample-wise negation, used to cancel a kernel's contribution
    pub fn negated(&self) -> Self {
        Self {
            support: self.support.clone(),
            values: self.values.iter().map(|v| -v).collect(),
        }
    }
}

/// Interface shared by all spike-triggered kernels
pub trait Filter: Send + Sync {
    /// Number of basis functions (and coefficients)
    fn basis_count(&self) -> usize;

    /// Current coefficients, one per basis function
    fn coefficients(&self) -> &[f64];

    /// Replace the coefficients after a fit
    fn set_coefficients(&mut self, coefficients: &[f64]) -> Result<()>;

    /// Set every coefficient to zero
    fn zero_out(&mut self);

    /// Sample the kernel at step `dt` (ms)
    fn interpolate(&self, dt: f64) -> InterpolatedKernel;

    /// Design columns of the kernel's basis functions against a spike train.
    ///
    /// The matrix has `round(duration_ms / dt)` rows and one column per basis
    /// function; entry `(t, l)` counts the spikes whose `l`-th basis window
    /// covers sample `t`.
    fn convolve_spike_train(&self, spike_times_ms: &[f64], duration_ms: f64, dt: f64) -> DMatrix<f64>;

    /// Same as [`Filter::convolve_spike_train`], keeping only `rows`.
    fn convolve_spike_train_rows(
        &self,
        spike_times_ms: &[f64],
        duration_ms: f64,
        dt: f64,
        rows: &[usize],
    ) -> DMatrix<f64> {
        self.convolve_spike_train(spike_times_ms, duration_ms, dt)
            .select_rows(rows.iter())
    }
}
