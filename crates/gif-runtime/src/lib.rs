//! Simulation engine and fitting pipeline for GIF neurons
//!
//! A generalized integrate-and-fire (GIF) neuron integrates its input current
//! with a leaky membrane, emits spikes stochastically through an exponential
//! escape rate, and adapts through two spike-triggered kernels: a current
//! `eta` and a threshold movement `gamma`.
//!
//! This crate simulates such a neuron ([`GifModel::simulate`],
//! [`GifModel::simulate_forced_spikes`]) and fits all of its parameters from
//! recorded traces in four stages:
//!
//! 1. reset voltage from the spike-triggered average ([`GifModel::fit_voltage_reset`]);
//! 2. passive parameters and `eta` by linear regression ([`GifModel::fit_subthreshold_dynamics`]);
//! 3. static threshold by maximum likelihood ([`GifModel::fit_static_threshold`]);
//! 4. dynamic threshold with `gamma` ([`GifModel::fit_dynamic_threshold`]).
//!
//! [`GifModel::fit`] runs them in order.

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export collaborator types
pub use gif_filter::{time_to_index, Filter, FilterError, InterpolatedKernel, RectLogSpacedFilter};
pub use gif_trace::{Experiment, Recording, SpikeTriggeredAverage, Trace, TraceError};

// Core modules
pub mod error;
pub mod fitting;
pub mod likelihood;
pub mod model;
pub mod regression;
pub mod simulation;
pub mod snapshot;
pub mod threshold;

// Re-export essential types
pub use error::{Result, RuntimeError};
pub use fitting::{FitConfig, FitReport};
pub use likelihood::{ConvergenceStatus, DesignMatrix, DesignMatrixBuilder, LikelihoodFit, NewtonOptimizer};
pub use model::{GifModel, GifParams, SpikeShape, SpikingModel, ThresholdModel, VoltageResponse};
pub use regression::{ResetFit, SubthresholdFit};
pub use simulation::{ForcedOutput, SimulationOutput, SpikeTriggeredSum};
pub use snapshot::{ParameterSnapshot, ParameterStatistics, PopulationSummary};
pub use threshold::{DynamicThresholdDesign, StaticThresholdDesign, ThresholdFit};
