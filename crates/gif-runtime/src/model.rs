//! GIF model parameters and kernels

use gif_filter::{Filter, RectLogSpacedFilter};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::*;

/// Scalar parameters of a generalized integrate-and-fire neuron
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GifParams {
    /// Simulation time step (ms)
    pub dt: f64,
    /// Leak conductance (nS)
    pub gl: f64,
    /// Membrane capacitance (nF)
    pub c: f64,
    /// Reversal potential (mV)
    pub el: f64,
    /// Reset voltage (mV)
    pub vr: f64,
    /// Absolute refractory period (ms)
    pub tref: f64,
    /// Baseline threshold (mV)
    pub vt_star: f64,
    /// Threshold sharpness (mV)
    pub dv: f64,
    /// Intensity at threshold (Hz)
    pub lambda0: f64,
}

impl Default for GifParams {
    fn default() -> Self {
        Self {
            dt: 0.1,
            gl: 0.01,
            c: 0.2,
            el: -65.0,
            vr: -50.0,
            tref: 4.0,
            vt_star: -48.0,
            dv: 0.5,
            lambda0: 1.0,
        }
    }
}

impl GifParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("dt", self.dt),
            ("gl", self.gl),
            ("c", self.c),
            ("el", self.el),
            ("vr", self.vr),
            ("tref", self.tref),
            ("vt_star", self.vt_star),
            ("dv", self.dv),
            ("lambda0", self.lambda0),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(RuntimeError::invalid_parameter(*name, value.to_string(), "finite"));
        }
        if self.dt <= 0.0 {
            return Err(RuntimeError::invalid_parameter("dt", self.dt.to_string(), "> 0.0"));
        }
        if self.tref < 0.0 {
            return Err(RuntimeError::invalid_parameter("tref", self.tref.to_string(), ">= 0.0"));
        }
        if self.c <= 0.0 {
            return Err(RuntimeError::invalid_parameter("c", self.c.to_string(), "> 0.0"));
        }
        if self.gl == 0.0 {
            return Err(RuntimeError::invalid_parameter("gl", "0", "!= 0.0"));
        }
        if self.dv == 0.0 {
            return Err(RuntimeError::invalid_parameter("dv", "0", "!= 0.0"));
        }
        if self.lambda0 < 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "lambda0",
                self.lambda0.to_string(),
                ">= 0.0",
            ));
        }
        Ok(())
    }

    /// Membrane time constant `c / gl` (ms)
    pub fn tau_m(&self) -> f64 {
        self.c / self.gl
    }
}

/// Average spike waveform measured by the reset stage
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpikeShape {
    /// Time relative to the spike (ms)
    pub support: Vec<f64>,
    /// Average voltage (mV)
    pub average: Vec<f64>,
}

/// Generalized integrate-and-fire neuron with escape noise.
///
/// The membrane follows a leaky integrator driven by the input current minus
/// the spike-triggered current `eta`. Spikes are emitted with intensity
/// `lambda0 * exp((V - vt_star - gamma_sum) / dv)`, where `gamma` is the
/// spike-triggered threshold movement. Both kernels are owned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct GifModel<F: Filter = RectLogSpacedFilter> {
    /// Scalar parameters
    pub params: GifParams,
    eta: F,
    gamma: F,
    spike_shape: Option<SpikeShape>,
}

fn default_kernel(f: impl Fn(f64) -> f64) -> RectLogSpacedFilter {
    let mut filter = RectLogSpacedFilter::default();
    if filter.set_from_function(f).is_err() {
        filter.zero_out();
    }
    filter
}

impl Default for GifModel {
    fn default() -> Self {
        Self {
            params: GifParams::default(),
            eta: default_kernel(|t| 0.2 * (-t / 100.0).exp()),
            gamma: default_kernel(|t| 10.0 * (-t / 100.0).exp()),
            spike_shape: None,
        }
    }
}

impl<F: Filter> GifModel<F> {
    /// Create a model from validated parameters and kernels
    pub fn new(params: GifParams, eta: F, gamma: F) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            eta,
            gamma,
            spike_shape: None,
        })
    }

    /// Spike-triggered current (nA)
    pub fn eta(&self) -> &F {
        &self.eta
    }

    /// Spike-triggered threshold movement (mV)
    pub fn gamma(&self) -> &F {
        &self.gamma
    }

    /// Mutable spike-triggered current
    pub fn eta_mut(&mut self) -> &mut F {
        &mut self.eta
    }

    /// Mutable spike-triggered threshold movement
    pub fn gamma_mut(&mut self) -> &mut F {
        &mut self.gamma
    }

    /// Replace the spike-triggered current kernel
    pub fn set_eta(&mut self, eta: F) {
        self.eta = eta;
    }

    /// Replace the spike-triggered threshold kernel
    pub fn set_gamma(&mut self, gamma: F) {
        self.gamma = gamma;
    }

    /// Average spike shape from the last reset fit
    pub fn spike_shape(&self) -> Option<&SpikeShape> {
        self.spike_shape.as_ref()
    }

    pub(crate) fn set_spike_shape(&mut self, shape: SpikeShape) {
        self.spike_shape = Some(shape);
    }
}

/// Models that turn an input current into spike times
pub trait SpikingModel {
    /// Simulate from rest at step `dt` (ms) and return spike times (ms)
    fn simulate_spiking_response<R: Rng + ?Sized>(
        &mut self,
        current: &[f64],
        dt: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>>;
}

/// Voltage response of a threshold model
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageResponse {
    /// Spike times (ms)
    pub spike_times: Vec<f64>,
    /// Membrane voltage (mV)
    pub v: Vec<f64>,
    /// Firing threshold (mV)
    pub v_t: Vec<f64>,
}

/// Spiking models with an explicit membrane voltage and firing threshold
pub trait ThresholdModel: SpikingModel {
    /// Simulate from rest at step `dt` (ms) and return voltage and threshold
    fn simulate_voltage_response<R: Rng + ?Sized>(
        &mut self,
        current: &[f64],
        dt: f64,
        rng: &mut R,
    ) -> Result<VoltageResponse>;
}
