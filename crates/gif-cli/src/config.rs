//! Configuration files for the GIF CLI
//!
//! A single TOML file describes the model, the stimulus used by `simulate`
//! and the settings of `fit`. Every section is optional.
//!
//! ```toml
//! [params]
//! gl = 0.01
//! vt_star = -48.0
//!
//! [kernels]
//! length = 500.0
//!
//! [eta]
//! amplitude = 0.2
//! tau = 100.0
//!
//! [stimulus]
//! duration_ms = 5000.0
//! mean = 0.3
//! std = 0.5
//!
//! [fit]
//! tref = 4.0
//! ```

use std::path::Path;

use anyhow::Context;
use gif_runtime::{FitConfig, GifModel, GifParams, RectLogSpacedFilter};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Everything the CLI reads from a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Scalar model parameters
    pub params: GifParams,
    /// Basis shared by both spike-triggered kernels
    pub kernels: KernelConfig,
    /// Spike-triggered current
    pub eta: KernelShape,
    /// Spike-triggered threshold movement
    pub gamma: KernelShape,
    /// Injected current for `simulate` and synthetic fits
    pub stimulus: StimulusConfig,
    /// Fitting pipeline settings
    pub fit: FitConfig,
    /// Synthetic data used by `fit` when no traces are given
    pub synthetic: SyntheticConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            params: GifParams::default(),
            kernels: KernelConfig::default(),
            eta: KernelShape {
                amplitude: 0.2,
                tau: 100.0,
            },
            gamma: KernelShape {
                amplitude: 10.0,
                tau: 100.0,
            },
            stimulus: StimulusConfig::default(),
            fit: FitConfig::default(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Log-spaced rectangular basis settings (ms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Kernel support
    pub length: f64,
    /// Narrowest bin
    pub binsize_lb: f64,
    /// Widest bin
    pub binsize_ub: f64,
    /// Growth of the bin width
    pub slope: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            length: 1000.0,
            binsize_lb: 2.0,
            binsize_ub: 1000.0,
            slope: 7.0,
        }
    }
}

impl KernelConfig {
    /// Empty basis with these settings
    pub fn basis(&self) -> CliResult<RectLogSpacedFilter> {
        RectLogSpacedFilter::new(self.length, self.binsize_lb, self.binsize_ub, self.slope)
            .map_err(|e| CliError::config(format!("Invalid kernel basis: {}", e)))
    }
}

/// Exponential kernel `amplitude * exp(-t / tau)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelShape {
    /// Value at t = 0
    pub amplitude: f64,
    /// Decay time constant (ms)
    pub tau: f64,
}

impl Default for KernelShape {
    fn default() -> Self {
        Self {
            amplitude: 0.0,
            tau: 100.0,
        }
    }
}

/// Gaussian white-noise current
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    /// Length of the stimulus (ms)
    pub duration_ms: f64,
    /// Mean current (nA)
    pub mean: f64,
    /// Standard deviation of the current (nA)
    pub std: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            duration_ms: 10_000.0,
            mean: 0.3,
            std: 0.5,
        }
    }
}

impl StimulusConfig {
    /// Sample the current at `dt` with a seeded generator
    pub fn generate(&self, dt: f64, seed: u64) -> CliResult<Vec<f64>> {
        if !(self.duration_ms.is_finite() && self.duration_ms > 0.0) {
            return Err(CliError::config(format!(
                "stimulus duration must be positive, got {}",
                self.duration_ms
            )));
        }
        let normal = Normal::new(self.mean, self.std)
            .map_err(|e| CliError::config(format!("Invalid stimulus: {}", e)))?;
        let mut rng = StdRng::seed_from_u64(seed);
        let n = (self.duration_ms / dt).round() as usize;
        Ok((0..n).map(|_| normal.sample(&mut rng)).collect())
    }
}

/// Ground truth recordings generated when `fit` runs without traces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of training traces
    pub traces: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self { traces: 2 }
    }
}

impl CliConfig {
    /// Load configuration from file; a missing file is an error
    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Err(CliError::missing_resource(format!(
                "config file {} not found",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content).map_err(|e| CliError::config(format!("Invalid config file: {}", e)))
    }

    /// Load `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> CliResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Model described by the `params`, `kernels`, `eta` and `gamma` sections
    pub fn build_model(&self) -> CliResult<GifModel> {
        let eta = self.shaped_kernel(&self.eta)?;
        let gamma = self.shaped_kernel(&self.gamma)?;
        Ok(GifModel::new(self.params.clone(), eta, gamma)?)
    }

    /// Model with the configured parameters and empty kernels, the starting
    /// point of a fit
    pub fn blank_model(&self) -> CliResult<GifModel> {
        Ok(GifModel::new(
            self.params.clone(),
            self.kernels.basis()?,
            self.kernels.basis()?,
        )?)
    }

    fn shaped_kernel(&self, shape: &KernelShape) -> CliResult<RectLogSpacedFilter> {
        if !(shape.tau.is_finite() && shape.tau > 0.0) {
            return Err(CliError::config(format!("kernel tau must be positive, got {}", shape.tau)));
        }
        let (amplitude, tau) = (shape.amplitude, shape.tau);
        self.kernels
            .basis()?
            .with_function(|t| amplitude * (-t / tau).exp())
            .map_err(|e| CliError::config(format!("Invalid kernel: {}", e)))
    }
}
