//! The four-stage fitting pipeline

use gif_filter::Filter;
use gif_trace::{Experiment, Recording, TraceError};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    error::*,
    likelihood::NewtonOptimizer,
    model::GifModel,
    regression::{ResetFit, SubthresholdFit},
    threshold::ThresholdFit,
};

/// Settings of a full fit
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FitConfig {
    /// Absolute refractory period assumed for the cell (ms)
    pub tref: f64,
    /// Samples this long before each spike are left out of the regression (ms)
    pub dt_before_spike: f64,
    /// Threshold sharpness used to seed the static threshold fit (mV)
    pub initial_dv: f64,
    /// Likelihood optimizer used by both threshold stages
    pub optimizer: NewtonOptimizer,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            tref: 4.0,
            dt_before_spike: 5.0,
            initial_dv: 50.0,
            optimizer: NewtonOptimizer::default(),
        }
    }
}

impl FitConfig {
    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if !(self.tref.is_finite() && self.tref >= 0.0) {
            return Err(RuntimeError::invalid_parameter("tref", self.tref.to_string(), ">= 0.0"));
        }
        if !self.dt_before_spike.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "dt_before_spike",
                self.dt_before_spike.to_string(),
                "finite",
            ));
        }
        if !(self.initial_dv.is_finite() && self.initial_dv != 0.0) {
            return Err(RuntimeError::invalid_parameter(
                "initial_dv",
                self.initial_dv.to_string(),
                "finite and != 0.0",
            ));
        }
        self.optimizer.validate()
    }
}

/// Results of every fitting stage
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Stage 1
    pub reset: ResetFit,
    /// Stage 2
    pub subthreshold: SubthresholdFit,
    /// Stage 3
    pub static_threshold: ThresholdFit,
    /// Stage 4
    pub dynamic_threshold: ThresholdFit,
}

impl FitReport {
    /// True when both likelihood fits met their tolerance
    pub fn converged(&self) -> bool {
        self.static_threshold.likelihood.converged() && self.dynamic_threshold.likelihood.converged()
    }
}

/// Apply `f` to every trace, in parallel when the `parallel` feature is on
pub(crate) fn per_trace<T, U, G>(traces: &[T], f: G) -> Result<Vec<U>>
where
    T: Recording,
    U: Send,
    G: Fn(&T) -> Result<U> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        traces.par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        traces.iter().map(f).collect()
    }
}

/// Traces whose [`Recording::use_trace`] flag is set
pub(crate) fn usable_traces<T: Recording>(traces: &[T]) -> Vec<&T> {
    traces.iter().filter(|t| t.use_trace()).collect()
}

impl<F: Filter> GifModel<F> {
    /// Check the traces share one sampling interval and adopt it as `dt`
    pub(crate) fn prepare_traces<T: Recording>(&mut self, traces: &[T]) -> Result<()> {
        let dt = traces.first().ok_or(RuntimeError::NoUsableTraces)?.dt();
        if let Some(trace) = traces.iter().find(|t| (t.dt() - dt).abs() > 1e-12 * dt) {
            return Err(TraceError::DtMismatch {
                expected: dt,
                got: trace.dt(),
            }
            .into());
        }
        self.params.dt = dt;
        self.params.validate()
    }

    /// Run the reset, sub-threshold, static and dynamic threshold stages in order.
    ///
    /// Like every stage, this skips traces whose `use_trace` flag is cleared.
    pub fn fit<T: Recording>(&mut self, traces: &[T], config: &FitConfig) -> Result<FitReport> {
        config.validate()?;
        let usable = usable_traces(traces);
        let traces = usable.as_slice();
        self.prepare_traces(traces)?;
        self.params.tref = config.tref;
        log::info!("Fitting GIF model on {} traces (dt = {} ms)", traces.len(), self.params.dt);

        let reset = self.fit_voltage_reset(traces)?;
        let subthreshold = self.fit_subthreshold_dynamics(traces, config.dt_before_spike)?;
        let static_threshold = self.fit_static_threshold(traces, config.initial_dv, &config.optimizer)?;
        let dynamic_threshold = self.fit_dynamic_threshold(traces, &config.optimizer)?;

        let report = FitReport {
            reset,
            subthreshold,
            static_threshold,
            dynamic_threshold,
        };
        if !report.converged() {
            log::warn!("GIF fit finished without likelihood convergence");
        }
        Ok(report)
    }

    /// Fit on the usable training traces of an experiment
    pub fn fit_experiment(&mut self, experiment: &Experiment, config: &FitConfig) -> Result<FitReport> {
        let traces = experiment.usable_training_traces();
        log::info!("Experiment '{}': {} usable training traces", experiment.name(), traces.len());
        self.fit(&traces, config)
    }
}
