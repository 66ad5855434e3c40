//! Reset voltage and sub-threshold dynamics (fitting stages 1 and 2)

use gif_filter::Filter;
use gif_trace::Recording;
use nalgebra::{DMatrix, DVector};

use crate::{
    error::*,
    fitting::{per_trace, usable_traces},
    model::{GifModel, SpikeShape},
};

/// Outcome of the reset voltage stage
#[derive(Debug, Clone, PartialEq)]
pub struct ResetFit {
    /// Estimated reset voltage (mV)
    pub vr: f64,
    /// Spikes that entered the spike-triggered averages
    pub spike_count: usize,
    /// Traces that contributed a spike-triggered average
    pub trace_count: usize,
}

/// Outcome of the sub-threshold regression
#[derive(Debug, Clone, PartialEq)]
pub struct SubthresholdFit {
    /// Leak conductance (nS)
    pub gl: f64,
    /// Membrane capacitance (nF)
    pub c: f64,
    /// Reversal potential (mV)
    pub el: f64,
    /// Coefficients of the spike-triggered current
    pub eta: Vec<f64>,
    /// Fraction of the variance of dV/dt explained by the regression
    pub var_explained_dv: f64,
    /// Fraction of the voltage variance explained by the forced simulation
    pub var_explained_v: f64,
    /// Number of stacked regression rows
    pub sample_count: usize,
}

/// Solve `a x = b` for a symmetric `a`, by Cholesky when `a` is positive
/// definite and by LU otherwise.
pub(crate) fn solve_symmetric(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let x = match a.clone().cholesky() {
        Some(cholesky) => cholesky.solve(b),
        None => a.lu().solve(b)?,
    };
    x.iter().all(|v| v.is_finite()).then_some(x)
}

impl<F: Filter> GifModel<F> {
    /// Estimate `vr` from the spike-triggered average voltage.
    ///
    /// Each trace contributes its own average with equal weight; `vr` is the
    /// averaged voltage at the first sample at least `tref` after the spike.
    pub fn fit_voltage_reset<T: Recording>(&mut self, traces: &[T]) -> Result<ResetFit> {
        let usable = usable_traces(traces);
        let traces = usable.as_slice();
        self.prepare_traces(traces)?;

        let stas: Vec<_> = traces
            .iter()
            .filter_map(|trace| trace.spike_triggered_average())
            .collect();
        let first = stas.first().ok_or_else(|| RuntimeError::no_spikes("voltage reset"))?;

        let weight = 1.0 / stas.len() as f64;
        let mut average = vec![0.0; first.average.len()];
        for sta in &stas {
            for (acc, x) in average.iter_mut().zip(&sta.average) {
                *acc += weight * x;
            }
        }
        let support = first.support.clone();

        let tref = self.params.tref;
        let index = support
            .iter()
            .position(|&s| s >= tref - 1e-9)
            .ok_or_else(|| {
                RuntimeError::invalid_config(format!(
                    "refractory period {} ms outside the spike-triggered window",
                    tref
                ))
            })?;

        self.params.vr = average[index];
        self.set_spike_shape(SpikeShape { support, average });

        let fit = ResetFit {
            vr: self.params.vr,
            spike_count: stas.iter().map(|sta| sta.spike_count).sum(),
            trace_count: stas.len(),
        };
        log::info!(
            "Reset voltage: Vr = {:.2} mV ({} spikes from {} traces)",
            fit.vr,
            fit.spike_count,
            fit.trace_count
        );
        Ok(fit)
    }

    /// Regression rows of one trace: design matrix and dV/dt target
    fn subthreshold_system<T: Recording + ?Sized>(
        &self,
        trace: &T,
        dt_before_spike: f64,
    ) -> (DMatrix<f64>, DVector<f64>) {
        let dt = trace.dt();
        let tref = self.params.tref;
        let v = trace.voltage();
        let current = trace.current();

        let mut selection = trace.valid_region(dt_before_spike, tref);
        selection.retain(|&t| t + 1 < trace.len());

        let shifted: Vec<f64> = trace.spike_times().iter().map(|s| s + tref).collect();
        let eta_columns =
            self.eta()
                .convolve_spike_train_rows(&shifted, trace.duration(), dt, &selection);

        let nb = self.eta().basis_count();
        let mut x = DMatrix::zeros(selection.len(), 3 + nb);
        for (r, &t) in selection.iter().enumerate() {
            x[(r, 0)] = v[t];
            x[(r, 1)] = current[t];
            x[(r, 2)] = 1.0;
        }
        x.view_mut((0, 3), (selection.len(), nb)).copy_from(&eta_columns);

        let y = DVector::from_iterator(
            selection.len(),
            selection.iter().map(|&t| (v[t + 1] - v[t]) / dt),
        );
        (x, y)
    }

    /// Estimate `gl`, `c`, `el` and the `eta` kernel by linear regression.
    ///
    /// Rows are taken away from spikes (`dt_before_spike` ms before each
    /// spike up to the end of the refractory period) and stacked over all
    /// traces before solving the normal equations.
    pub fn fit_subthreshold_dynamics<T: Recording>(
        &mut self,
        traces: &[T],
        dt_before_spike: f64,
    ) -> Result<SubthresholdFit> {
        let usable = usable_traces(traces);
        let traces = usable.as_slice();
        self.prepare_traces(traces)?;

        let model = &*self;
        let systems = per_trace(traces, |trace| Ok(model.subthreshold_system(trace, dt_before_spike)))?;

        let p = 3 + self.eta().basis_count();
        let mut xtx = DMatrix::zeros(p, p);
        let mut xty = DVector::zeros(p);
        let mut sample_count = 0;
        for (x, y) in &systems {
            xtx += x.tr_mul(x);
            xty += x.tr_mul(y);
            sample_count += y.len();
        }
        if sample_count < p {
            return Err(RuntimeError::invalid_config(format!(
                "{} regression samples for {} parameters",
                sample_count, p
            )));
        }

        let beta = solve_symmetric(xtx, &xty)
            .ok_or_else(|| RuntimeError::singular_matrix("sub-threshold regression"))?;

        let c = 1.0 / beta[1];
        let gl = -beta[0] * c;
        let el = beta[2] * c / gl;
        if !(c.is_finite() && c > 0.0 && gl.is_finite() && gl != 0.0 && el.is_finite()) {
            return Err(RuntimeError::numerical_error(format!(
                "regression gave C = {}, gl = {}, El = {}",
                c, gl, el
            )));
        }
        let eta: Vec<f64> = beta.rows(3, p - 3).iter().map(|b| -b * c).collect();

        // Variance explained on the regression target
        let (mut residual, mut sum, mut sum_sq) = (0.0, 0.0, 0.0);
        for (x, y) in &systems {
            residual += (y - x * &beta).norm_squared();
            sum += y.sum();
            sum_sq += y.norm_squared();
        }
        let n = sample_count as f64;
        let var_y = sum_sq / n - (sum / n).powi(2);
        let var_explained_dv = 1.0 - residual / n / var_y;

        self.params.c = c;
        self.params.gl = gl;
        self.params.el = el;
        self.eta_mut().set_coefficients(&eta)?;

        let var_explained_v = self.voltage_variance_explained(traces)?;

        log::info!(
            "Sub-threshold dynamics: gl = {:.4} nS, C = {:.4} nF, El = {:.2} mV",
            gl,
            c,
            el
        );
        log::info!(
            "Variance explained: dV/dt {:.2}%, V {:.2}%",
            100.0 * var_explained_dv,
            100.0 * var_explained_v
        );

        Ok(SubthresholdFit {
            gl,
            c,
            el,
            eta,
            var_explained_dv,
            var_explained_v,
            sample_count,
        })
    }

    /// Fraction of the recorded voltage variance reproduced by the forced
    /// simulation, outside refractory windows.
    pub fn voltage_variance_explained<T: Recording>(&self, traces: &[T]) -> Result<f64> {
        let tref = self.params.tref;
        let parts = per_trace(traces, |trace| {
            let recorded = trace.voltage();
            let v0 = recorded.first().copied().unwrap_or(self.params.el);
            let simulated = self.simulate_forced_spikes(trace.current(), v0, &trace.spike_times())?.v;

            let selection = trace.valid_region(0.0, tref);
            if selection.is_empty() {
                return Ok((0.0, 0.0));
            }
            let n = selection.len() as f64;
            let mean = selection.iter().map(|&t| recorded[t]).sum::<f64>() / n;
            let sse: f64 = selection
                .iter()
                .map(|&t| (simulated[t] - recorded[t]).powi(2))
                .sum();
            let total: f64 = selection.iter().map(|&t| (recorded[t] - mean).powi(2)).sum();
            Ok((sse, total))
        })?;

        let (sse, total) = parts
            .iter()
            .fold((0.0, 0.0), |(a, b), (s, t)| (a + s, b + t));
        Ok(1.0 - sse / total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GifParams;
    use gif_filter::RectLogSpacedFilter;
    use gif_trace::Trace;

    #[test]
    fn test_solve_symmetric() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let x = solve_symmetric(a.clone(), &b).unwrap();
        assert!((a * &x - b).norm() < 1e-12);

        // Indefinite but regular: LU path
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let b = DVector::from_vec(vec![2.0, 3.0]);
        let x = solve_symmetric(a, &b).unwrap();
        assert_eq!(x.as_slice(), &[3.0, 2.0]);

        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(solve_symmetric(singular, &b).is_none());
    }

    fn spike_shape_trace() -> Trace {
        let dt = 0.1;
        let n = 5000;
        let mut v = vec![-70.0; n];
        for s in [1000usize, 3000] {
            v[s] = 20.0;
            // Recovery after 4 ms
            for t in s + 40..s + 100 {
                v[t] = -55.0;
            }
        }
        Trace::new(v, vec![0.0; n], dt)
            .unwrap()
            .with_spike_indices(vec![1000, 3000])
            .unwrap()
    }

    #[test]
    fn test_reset_voltage_from_spike_shape() {
        let mut model = GifModel::default();
        let fit = model.fit_voltage_reset(&[spike_shape_trace()]).unwrap();
        assert_eq!(fit.vr, -55.0);
        assert_eq!(fit.spike_count, 2);
        assert_eq!(fit.trace_count, 1);
        assert_eq!(model.params.vr, -55.0);

        let shape = model.spike_shape().unwrap();
        assert_eq!(shape.support.len(), shape.average.len());
        assert!(shape.average.iter().any(|&v| v == 20.0));
    }

    #[test]
    fn test_reset_averages_traces_equally() {
        let mut other = spike_shape_trace();
        // One spike only, recovering to a different voltage
        let mut v = other.voltage().to_vec();
        for x in v.iter_mut().skip(1040).take(60) {
            *x = -45.0;
        }
        other = Trace::new(v, vec![0.0; 5000], 0.1)
            .unwrap()
            .with_spike_indices(vec![1000])
            .unwrap();

        let mut model = GifModel::default();
        let fit = model.fit_voltage_reset(&[spike_shape_trace(), other]).unwrap();
        assert!((fit.vr - (-50.0)).abs() < 1e-12);
        assert_eq!(fit.spike_count, 3);
    }

    #[test]
    fn test_reset_requires_spikes() {
        let quiet = Trace::new(vec![-70.0; 1000], vec![0.0; 1000], 0.1).unwrap();
        let mut model = GifModel::default();
        let err = model.fit_voltage_reset(&[quiet]).unwrap_err();
        assert!(matches!(err, RuntimeError::NoSpikes { .. }));

        let empty: [Trace; 0] = [];
        let err = model.fit_voltage_reset(&empty).unwrap_err();
        assert!(matches!(err, RuntimeError::NoUsableTraces));
    }

    #[test]
    fn test_reset_rejects_long_refractory() {
        let mut model = GifModel::default();
        model.params.tref = 50.0;
        let err = model.fit_voltage_reset(&[spike_shape_trace()]).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_regression_recovers_passive_parameters() {
        let params = GifParams {
            gl: 0.02,
            c: 0.15,
            el: -70.0,
            ..Default::default()
        };
        let kernel = || RectLogSpacedFilter::new(50.0, 2.0, 50.0, 7.0).unwrap();
        let truth = GifModel::new(params, kernel(), kernel()).unwrap();

        // Current steps and a few imposed spikes, no adaptation current
        let n = 20_000;
        let current: Vec<f64> = (0..n)
            .map(|t| if (t / 2500) % 2 == 0 { 0.05 } else { -0.1 })
            .collect();
        let spikes = [200.0, 650.0, 1100.0, 1480.0];
        let v = truth.simulate_forced_spikes(&current, -60.0, &spikes).unwrap().v;
        let trace = Trace::new(v, current, 0.1)
            .unwrap()
            .with_spike_times(&spikes)
            .unwrap();

        let mut model = GifModel::new(GifParams::default(), kernel(), kernel()).unwrap();
        let fit = model.fit_subthreshold_dynamics(&[&trace], 5.0).unwrap();
        assert!((fit.gl - 0.02).abs() < 1e-6);
        assert!((fit.c - 0.15).abs() < 1e-6);
        assert!((fit.el + 70.0).abs() < 1e-4);
        assert!(fit.eta.iter().all(|e| e.abs() < 1e-6));
        assert!(fit.var_explained_dv > 0.999999);
        assert!(fit.var_explained_v > 0.999999);
        assert_eq!(model.params.gl, fit.gl);
    }

    #[test]
    fn test_regression_needs_traces() {
        let mut model = GifModel::default();
        let empty: Vec<Trace> = Vec::new();
        let err = model.fit_subthreshold_dynamics(&empty, 5.0).unwrap_err();
        assert!(matches!(err, RuntimeError::NoUsableTraces));
    }
}
