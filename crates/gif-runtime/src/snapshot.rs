//! Read-only view of a model's parameters for reporting

use std::fmt;

use gif_filter::{Filter, InterpolatedKernel};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{error::*, model::GifModel};

/// All scalar parameters and both kernels sampled at `dt`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterSnapshot {
    /// Time step (ms)
    pub dt: f64,
    /// Leak conductance (nS)
    pub gl: f64,
    /// Capacitance (nF)
    pub c: f64,
    /// Reversal potential (mV)
    pub el: f64,
    /// Reset voltage (mV)
    pub vr: f64,
    /// Refractory period (ms)
    pub tref: f64,
    /// Baseline threshold (mV)
    pub vt_star: f64,
    /// Threshold sharpness (mV)
    pub dv: f64,
    /// Intensity at threshold (Hz)
    pub lambda0: f64,
    /// Membrane time constant (ms)
    pub tau_m: f64,
    /// Membrane resistance (MOhm)
    pub r: f64,
    /// Spike-triggered current (nA)
    pub eta: InterpolatedKernel,
    /// Spike-triggered threshold movement (mV)
    pub gamma: InterpolatedKernel,
}

impl<F: Filter> GifModel<F> {
    /// Snapshot of the current parameters
    pub fn snapshot(&self) -> ParameterSnapshot {
        let p = &self.params;
        ParameterSnapshot {
            dt: p.dt,
            gl: p.gl,
            c: p.c,
            el: p.el,
            vr: p.vr,
            tref: p.tref,
            vt_star: p.vt_star,
            dv: p.dv,
            lambda0: p.lambda0,
            tau_m: p.tau_m(),
            r: 1.0 / p.gl,
            eta: self.eta().interpolate(p.dt),
            gamma: self.gamma().interpolate(p.dt),
        }
    }
}

impl ParameterSnapshot {
    /// Impulse response of the passive membrane, `exp(-t / tau_m) / C`
    pub fn membrane_filter(&self, support: &[f64]) -> Vec<f64> {
        support
            .iter()
            .map(|&t| (-t / self.tau_m).exp() / self.c)
            .collect()
    }

    /// Firing intensity (Hz) at voltage `v` (mV) with the threshold at rest
    pub fn escape_rate(&self, v: f64) -> f64 {
        self.lambda0 * ((v - self.vt_star) / self.dv).exp()
    }

    fn scalars(&self) -> [(&'static str, f64); 10] {
        [
            ("tau_m", self.tau_m),
            ("R", self.r),
            ("C", self.c),
            ("gl", self.gl),
            ("El", self.el),
            ("Tref", self.tref),
            ("Vr", self.vr),
            ("Vt*", self.vt_star),
            ("DV", self.dv),
            ("lambda0", self.lambda0),
        ]
    }
}

const UNITS: [&str; 10] = ["ms", "MOhm", "nF", "nS", "mV", "ms", "mV", "mV", "mV", "Hz"];

impl fmt::Display for ParameterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GIF model parameters (dt = {} ms)", self.dt)?;
        writeln!(f, "{:-<36}", "")?;
        for ((name, value), unit) in self.scalars().iter().zip(UNITS) {
            writeln!(f, "{:<10}{:>16.4} {}", name, value, unit)?;
        }
        writeln!(f, "{:-<36}", "")?;
        writeln!(f, "eta:   {} samples", self.eta.len())?;
        write!(f, "gamma: {} samples", self.gamma.len())
    }
}

/// Mean and standard deviation of one parameter across models
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterStatistics {
    /// Parameter name
    pub name: String,
    /// Mean across models
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

/// Summary of several fitted models, e.g. one per recorded cell
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PopulationSummary {
    /// Number of models summarised
    pub count: usize,
    /// One entry per scalar parameter
    pub parameters: Vec<ParameterStatistics>,
}

impl PopulationSummary {
    /// Summarise `snapshots`; fails on an empty slice
    pub fn from_snapshots(snapshots: &[ParameterSnapshot]) -> Result<Self> {
        let first = snapshots
            .first()
            .ok_or_else(|| RuntimeError::invalid_config("no models to summarise"))?;
        let n = snapshots.len() as f64;

        let parameters = first
            .scalars()
            .iter()
            .enumerate()
            .map(|(k, (name, _))| {
                let values: Vec<f64> = snapshots.iter().map(|s| s.scalars()[k].1).collect();
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                ParameterStatistics {
                    name: name.to_string(),
                    mean,
                    std: var.sqrt(),
                }
            })
            .collect();

        Ok(Self {
            count: snapshots.len(),
            parameters,
        })
    }

    /// Statistics of the parameter called `name`
    pub fn get(&self, name: &str) -> Option<&ParameterStatistics> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl fmt::Display for PopulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary of {} models", self.count)?;
        for p in &self.parameters {
            writeln!(f, "{:<10}{:>14.4} +/- {:.4}", p.name, p.mean, p.std)?;
        }
        Ok(())
    }
}
