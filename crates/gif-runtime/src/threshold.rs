//! Static and dynamic threshold fits (stages 3 and 4)

use gif_filter::Filter;
use gif_trace::Recording;
use nalgebra::{DMatrix, DVector};

use crate::{
    error::*,
    fitting::{per_trace, usable_traces},
    likelihood::{DesignMatrix, DesignMatrixBuilder, LikelihoodFit, NewtonOptimizer},
    model::GifModel,
};

/// Outcome of a threshold fit
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdFit {
    /// Threshold sharpness (mV)
    pub dv: f64,
    /// Baseline threshold (mV)
    pub vt_star: f64,
    /// Coefficients of the threshold kernel (empty for the static fit)
    pub gamma: Vec<f64>,
    /// Optimizer result
    pub likelihood: LikelihoodFit,
}

/// Rows kept for threshold fitting: the spike samples themselves and
/// everything outside refractory windows.
fn threshold_rows<R: Recording + ?Sized>(recording: &R, tref: f64) -> (Vec<usize>, Vec<usize>) {
    let selection = recording.valid_region(-recording.dt(), tref);
    let train = recording.spike_train();
    let spike_rows = selection
        .iter()
        .enumerate()
        .filter_map(|(r, &t)| train[t].then_some(r))
        .collect();
    (selection, spike_rows)
}

/// Design with columns (voltage, constant)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticThresholdDesign {
    /// Refractory period (ms)
    pub tref: f64,
}

impl DesignMatrixBuilder for StaticThresholdDesign {
    fn build<R: Recording + ?Sized>(&self, recording: &R, v_est: &[f64]) -> Result<DesignMatrix> {
        let (selection, spike_rows) = threshold_rows(recording, self.tref);
        let x = DMatrix::from_fn(selection.len(), 2, |r, c| {
            if c == 0 {
                v_est[selection[r]]
            } else {
                1.0
            }
        });
        Ok(DesignMatrix::new(x, &spike_rows, recording.dt()))
    }
}

/// Design with columns (voltage, constant, threshold kernel basis)
#[derive(Debug, Clone, Copy)]
pub struct DynamicThresholdDesign<'a, F: Filter> {
    /// Refractory period (ms)
    pub tref: f64,
    /// Kernel whose basis functions give the extra columns
    pub gamma: &'a F,
}

impl<F: Filter> DesignMatrixBuilder for DynamicThresholdDesign<'_, F> {
    fn build<R: Recording + ?Sized>(&self, recording: &R, v_est: &[f64]) -> Result<DesignMatrix> {
        let dt = recording.dt();
        let (selection, spike_rows) = threshold_rows(recording, self.tref);
        let shifted: Vec<f64> = recording
            .spike_times()
            .iter()
            .map(|s| s + self.tref)
            .collect();
        let gamma_columns =
            self.gamma
                .convolve_spike_train_rows(&shifted, recording.duration(), dt, &selection);

        let nb = self.gamma.basis_count();
        let mut x = DMatrix::zeros(selection.len(), 2 + nb);
        for (r, &t) in selection.iter().enumerate() {
            x[(r, 0)] = v_est[t];
            x[(r, 1)] = 1.0;
        }
        x.view_mut((0, 2), (selection.len(), nb)).copy_from(&gamma_columns);
        Ok(DesignMatrix::new(x, &spike_rows, dt))
    }
}

impl<F: Filter> GifModel<F> {
    /// Per-trace designs built on the voltage of the forced simulation
    pub fn collect_designs<T, B>(&self, traces: &[T], builder: &B) -> Result<Vec<DesignMatrix>>
    where
        T: Recording,
        B: DesignMatrixBuilder,
    {
        per_trace(traces, |trace| {
            let v0 = trace.voltage().first().copied().unwrap_or(self.params.el);
            let forced = self.simulate_forced_spikes(trace.current(), v0, &trace.spike_times())?;
            builder.build(trace, &forced.v)
        })
    }

    /// Update `dv` and `vt_star` from `(1/dv, -vt_star/dv)`, when finite
    fn apply_threshold(&mut self, beta: &DVector<f64>) -> bool {
        let dv = 1.0 / beta[0];
        let vt_star = -beta[1] * dv;
        if !(dv.is_finite() && dv != 0.0 && vt_star.is_finite()) {
            log::warn!("Threshold fit gave DV = {}, Vt* = {}; parameters left unchanged", dv, vt_star);
            return false;
        }
        self.params.dv = dv;
        self.params.vt_star = vt_star;
        true
    }

    /// Fit a threshold without spike-triggered movement.
    ///
    /// `gamma` is zeroed, `lambda0` set to 1 Hz and `vt_star` seeded from the
    /// mean firing rate with `dv = initial_dv`, then `(1/dv, -vt_star/dv)` is
    /// refined by maximum likelihood.
    pub fn fit_static_threshold<T: Recording>(
        &mut self,
        traces: &[T],
        initial_dv: f64,
        optimizer: &NewtonOptimizer,
    ) -> Result<ThresholdFit> {
        let usable = usable_traces(traces);
        let traces = usable.as_slice();
        self.prepare_traces(traces)?;
        if !(initial_dv.is_finite() && initial_dv != 0.0) {
            return Err(RuntimeError::invalid_parameter(
                "initial_dv",
                initial_dv.to_string(),
                "finite and != 0.0",
            ));
        }

        let spikes: usize = traces.iter().map(|t| t.spike_count_in_roi()).sum();
        let roi_ms: f64 = traces.iter().map(|t| t.roi_duration()).sum();
        if spikes == 0 || roi_ms <= 0.0 {
            return Err(RuntimeError::no_spikes("static threshold"));
        }
        let rate = 1000.0 * spikes as f64 / roi_ms;

        self.params.lambda0 = 1.0;
        self.params.dv = initial_dv;
        self.params.vt_star = -rate.ln() * initial_dv;
        self.gamma_mut().zero_out();
        log::info!(
            "Static threshold: mean rate {:.2} Hz, initial Vt* = {:.2} mV",
            rate,
            self.params.vt_star
        );

        let builder = StaticThresholdDesign { tref: self.params.tref };
        let designs = self.collect_designs(traces, &builder)?;
        let beta0 = DVector::from_vec(vec![1.0 / self.params.dv, -self.params.vt_star / self.params.dv]);
        let likelihood = optimizer.maximize(beta0, &designs, self.params.lambda0, self.params.dt)?;

        self.apply_threshold(&likelihood.beta);
        log::info!(
            "Static threshold: DV = {:.3} mV, Vt* = {:.3} mV, {:.3} bits/spike ({:?})",
            self.params.dv,
            self.params.vt_star,
            likelihood.normalized_log_likelihood,
            likelihood.status
        );

        Ok(ThresholdFit {
            dv: self.params.dv,
            vt_star: self.params.vt_star,
            gamma: Vec::new(),
            likelihood,
        })
    }

    /// Fit the threshold together with its spike-triggered movement `gamma`.
    ///
    /// Starts from the current `dv`, `vt_star` and `gamma`, usually the
    /// output of [`GifModel::fit_static_threshold`].
    pub fn fit_dynamic_threshold<T: Recording>(
        &mut self,
        traces: &[T],
        optimizer: &NewtonOptimizer,
    ) -> Result<ThresholdFit> {
        let usable = usable_traces(traces);
        let traces = usable.as_slice();
        self.prepare_traces(traces)?;

        let dv = self.params.dv;
        let mut seed = vec![1.0 / dv, -self.params.vt_star / dv];
        seed.extend(self.gamma().coefficients().iter().map(|g| -g / dv));
        let beta0 = DVector::from_vec(seed);

        let builder = DynamicThresholdDesign {
            tref: self.params.tref,
            gamma: self.gamma(),
        };
        let designs = self.collect_designs(traces, &builder)?;
        let likelihood = optimizer.maximize(beta0, &designs, self.params.lambda0, self.params.dt)?;

        if self.apply_threshold(&likelihood.beta) {
            let dv = self.params.dv;
            let gamma: Vec<f64> = likelihood.beta.iter().skip(2).map(|b| -b * dv).collect();
            self.gamma_mut().set_coefficients(&gamma)?;
        }
        log::info!(
            "Dynamic threshold: DV = {:.3} mV, Vt* = {:.3} mV, {:.3} bits/spike ({:?})",
            self.params.dv,
            self.params.vt_star,
            likelihood.normalized_log_likelihood,
            likelihood.status
        );

        Ok(ThresholdFit {
            dv: self.params.dv,
            vt_star: self.params.vt_star,
            gamma: self.gamma().coefficients().to_vec(),
            likelihood,
        })
    }
}
