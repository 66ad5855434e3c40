//! Stochastic and spike-forced integration of the GIF membrane

use gif_filter::{time_to_index, Filter};
use rand::Rng;

use crate::{
    error::*,
    model::{GifModel, SpikingModel, ThresholdModel, VoltageResponse},
};

/// Result of a stochastic simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    /// Sample times (ms)
    pub time: Vec<f64>,
    /// Membrane voltage (mV); samples inside refractory windows hold 0
    pub v: Vec<f64>,
    /// Summed spike-triggered current (nA)
    pub eta_sum: Vec<f64>,
    /// Firing threshold `vt_star + gamma_sum` (mV)
    pub v_t: Vec<f64>,
    /// Spike times (ms)
    pub spike_times: Vec<f64>,
}

/// Result of a simulation with imposed spikes
#[derive(Debug, Clone, PartialEq)]
pub struct ForcedOutput {
    /// Sample times (ms)
    pub time: Vec<f64>,
    /// Membrane voltage (mV)
    pub v: Vec<f64>,
    /// Summed spike-triggered current (nA)
    pub eta_sum: Vec<f64>,
}

/// Accumulator for kernels triggered by spikes.
///
/// Holds `len` visible samples followed by `padding` samples of slack, so a
/// kernel started near the end never writes out of bounds. Anything that
/// would land past the slack is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeTriggeredSum {
    values: Vec<f64>,
    len: usize,
}

impl SpikeTriggeredSum {
    /// Zeroed accumulator with `len` visible samples
    pub fn new(len: usize, padding: usize) -> Self {
        Self {
            values: vec![0.0; len + padding],
            len,
        }
    }

    /// Add `kernel` starting at sample `start`
    pub fn superpose(&mut self, start: usize, kernel: &[f64]) {
        if start >= self.values.len() {
            return;
        }
        for (acc, k) in self.values[start..].iter_mut().zip(kernel) {
            *acc += k;
        }
    }

    /// Value at sample `t`, zero past the end
    pub fn get(&self, t: usize) -> f64 {
        self.values.get(t).copied().unwrap_or(0.0)
    }

    /// Visible samples
    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.len]
    }

    /// Visible samples, consuming the accumulator
    pub fn into_vec(mut self) -> Vec<f64> {
        self.values.truncate(self.len);
        self.values
    }
}

fn time_axis(len: usize, dt: f64) -> Vec<f64> {
    (0..len).map(|k| k as f64 * dt).collect()
}

impl<F: Filter> GifModel<F> {
    /// Simulate the stochastic response to `current` (nA) from voltage `v0`.
    ///
    /// Each step integrates the membrane with forward Euler, then draws a
    /// spike with probability `1 - exp(-lambda * dt)`. After a spike the
    /// refractory samples are skipped, the voltage restarts at `vr` and both
    /// kernels are added from that sample on.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        current: &[f64],
        v0: f64,
        rng: &mut R,
    ) -> Result<SimulationOutput> {
        let p = &self.params;
        p.validate()?;

        let n = current.len();
        let dt = p.dt;
        let dt_s = dt / 1000.0;
        let tref_i = time_to_index(p.tref, dt);
        let eta = self.eta().interpolate(dt).values;
        let gamma = self.gamma().interpolate(dt).values;

        let mut eta_sum = SpikeTriggeredSum::new(n, eta.len() + tref_i + 1);
        let mut gamma_sum = SpikeTriggeredSum::new(n, gamma.len() + tref_i + 1);
        // Samples skipped during refractory windows stay at 0 mV
        let mut v = vec![0.0; n];
        let mut spike_times = Vec::new();
        if let Some(first) = v.first_mut() {
            *first = v0;
        }

        let mut t = 0;
        while t + 1 < n {
            v[t + 1] = v[t] + dt / p.c * (-p.gl * (v[t] - p.el) + current[t] - eta_sum.get(t));

            let lambda = p.lambda0 * ((v[t + 1] - p.vt_star - gamma_sum.get(t)) / p.dv).exp();
            let p_survive = (-lambda * dt_s).exp();
            let r: f64 = rng.gen();

            if r > p_survive {
                spike_times.push((t + 1) as f64 * dt);
                t += tref_i;
                if t + 1 < n {
                    v[t + 1] = p.vr;
                }
                eta_sum.superpose(t + 1, &eta);
                gamma_sum.superpose(t + 1, &gamma);
            }
            t += 1;
        }

        log::debug!("Stochastic simulation: {} samples, {} spikes", n, spike_times.len());

        let v_t = gamma_sum.as_slice().iter().map(|g| g + p.vt_star).collect();
        Ok(SimulationOutput {
            time: time_axis(n, dt),
            v,
            eta_sum: eta_sum.into_vec(),
            v_t,
            spike_times,
        })
    }

    /// Integrate the membrane with spikes imposed at `spike_times` (ms).
    ///
    /// The voltage is pinned to `vr` at every `spike + tref` sample and the
    /// sample before it is set to 0; `eta` starts at the same sample. Spike
    /// times must be non-negative and strictly ascending.
    pub fn simulate_forced_spikes(
        &self,
        current: &[f64],
        v0: f64,
        spike_times: &[f64],
    ) -> Result<ForcedOutput> {
        let p = &self.params;
        p.validate()?;

        if let Some(bad) = spike_times.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
            return Err(RuntimeError::invalid_parameter(
                "spike_times",
                bad.to_string(),
                "finite and >= 0.0",
            ));
        }

        let n = current.len();
        let dt = p.dt;
        let tref_i = time_to_index(p.tref, dt);
        let spikes: Vec<usize> = spike_times.iter().map(|&s| time_to_index(s, dt)).collect();
        if let Some(w) = spikes.windows(2).find(|w| w[1] <= w[0]) {
            return Err(RuntimeError::invalid_parameter(
                "spike_times",
                format!("samples {} then {}", w[0], w[1]),
                "strictly ascending",
            ));
        }

        let eta = self.eta().interpolate(dt).values;
        let mut eta_sum = SpikeTriggeredSum::new(n, eta.len() + tref_i + 1);
        for &s in &spikes {
            eta_sum.superpose(s + tref_i, &eta);
        }

        let mut resets = spikes.iter().map(|&s| s + tref_i).filter(|&r| r < n).peekable();
        let mut v = vec![0.0; n];
        if let Some(first) = v.first_mut() {
            *first = v0;
        }

        for t in 0..n {
            if resets.peek() == Some(&t) {
                resets.next();
                if t > 0 {
                    v[t - 1] = 0.0;
                }
                v[t] = p.vr;
            }
            if t + 1 < n {
                v[t + 1] = v[t] + dt / p.c * (-p.gl * (v[t] - p.el) + current[t] - eta_sum.get(t));
            }
        }

        Ok(ForcedOutput {
            time: time_axis(n, dt),
            v,
            eta_sum: eta_sum.into_vec(),
        })
    }
}

impl<F: Filter> SpikingModel for GifModel<F> {
    fn simulate_spiking_response<R: Rng + ?Sized>(
        &mut self,
        current: &[f64],
        dt: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        self.params.dt = dt;
        let el = self.params.el;
        Ok(self.simulate(current, el, rng)?.spike_times)
    }
}

impl<F: Filter> ThresholdModel for GifModel<F> {
    fn simulate_voltage_response<R: Rng + ?Sized>(
        &mut self,
        current: &[f64],
        dt: f64,
        rng: &mut R,
    ) -> Result<VoltageResponse> {
        self.params.dt = dt;
        let el = self.params.el;
        let out = self.simulate(current, el, rng)?;
        Ok(VoltageResponse {
            spike_times: out.spike_times,
            v: out.v,
            v_t: out.v_t,
        })
    }
}
