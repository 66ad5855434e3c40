//! Groups of traces recorded from one cell

use crate::{error::*, Recording, Trace};

/// Training and test traces recorded from one cell at a common sampling interval
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    name: String,
    dt: f64,
    training_set: Vec<Trace>,
    test_set: Vec<Trace>,
}

impl Experiment {
    /// Create an empty experiment sampled at `dt` (ms)
    pub fn new(name: impl Into<String>, dt: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TraceError::InvalidDt { dt });
        }
        Ok(Self {
            name: name.into(),
            dt,
            training_set: Vec::new(),
            test_set: Vec::new(),
        })
    }

    fn check_dt(&self, trace: &Trace) -> Result<()> {
        if (trace.dt() - self.dt).abs() > 1e-12 * self.dt {
            return Err(TraceError::DtMismatch {
                expected: self.dt,
                got: trace.dt(),
            });
        }
        Ok(())
    }

    /// Add a trace used for fitting
    pub fn add_training_trace(&mut self, trace: Trace) -> Result<()> {
        self.check_dt(&trace)?;
        self.training_set.push(trace);
        Ok(())
    }

    /// Add a held-out trace
    pub fn add_test_trace(&mut self, trace: Trace) -> Result<()> {
        self.check_dt(&trace)?;
        self.test_set.push(trace);
        Ok(())
    }

    /// Experiment name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sampling interval (ms)
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Traces used for fitting
    pub fn training_set(&self) -> &[Trace] {
        &self.training_set
    }

    /// Mutable access, e.g. to run spike detection or set regions of interest
    pub fn training_set_mut(&mut self) -> &mut [Trace] {
        &mut self.training_set
    }

    /// Held-out traces
    pub fn test_set(&self) -> &[Trace] {
        &self.test_set
    }

    /// Training traces flagged for use
    pub fn usable_training_traces(&self) -> Vec<&Trace> {
        self.training_set.iter().filter(|t| t.use_trace()).collect()
    }

    /// Run spike detection on every trace, returning the total spike count
    pub fn detect_spikes(&mut self, threshold: f64, refractory_ms: f64) -> usize {
        self.training_set
            .iter_mut()
            .chain(self.test_set.iter_mut())
            .map(|t| t.detect_spikes(threshold, refractory_ms))
            .sum()
    }
}
