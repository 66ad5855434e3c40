//! Newton-Raphson maximisation of a log-linear point-process likelihood
//!
//! The intensity is `lambda(t) = lambda0 * exp(X(t) . beta)`. Over a set of
//! independent traces the log-likelihood
//!
//! ```text
//! L(beta) = sum_spikes X_spike . beta - lambda0 * dt * sum_t exp(X(t) . beta)
//! ```
//!
//! is concave, so Newton steps with the analytic gradient and Hessian climb to
//! the maximum. Log-likelihood, gradient and Hessian are additive across
//! traces, so each trace keeps its own [`DesignMatrix`].

use std::f64::consts::LN_2;

use gif_trace::Recording;
use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{error::*, regression::solve_symmetric};

/// Per-trace design of a log-linear intensity
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    /// One row per sample, one column per parameter
    pub x: DMatrix<f64>,
    /// Rows of `x` at which a spike was observed
    pub x_spikes: DMatrix<f64>,
    /// Column sums of `x_spikes`
    pub sum_x_spikes: DVector<f64>,
    /// Number of spike rows
    pub spike_count: usize,
    /// Duration covered by the rows (s)
    pub duration_s: f64,
}

impl DesignMatrix {
    /// Build from the full matrix and the indices of its spike rows
    pub fn new(x: DMatrix<f64>, spike_rows: &[usize], dt_ms: f64) -> Self {
        let x_spikes = x.select_rows(spike_rows.iter());
        let sum_x_spikes = x_spikes.row_sum().transpose();
        let duration_s = x.nrows() as f64 * dt_ms / 1000.0;
        Self {
            x,
            x_spikes,
            sum_x_spikes,
            spike_count: spike_rows.len(),
            duration_s,
        }
    }

    /// Number of parameters
    pub fn parameter_count(&self) -> usize {
        self.x.ncols()
    }
}

/// Builds the design matrix of one trace from its estimated voltage
pub trait DesignMatrixBuilder: Sync {
    /// Design of `recording`, given the voltage `v_est` of the forced simulation
    fn build<R: Recording + ?Sized>(&self, recording: &R, v_est: &[f64]) -> Result<DesignMatrix>;
}

/// How an optimisation run ended
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConvergenceStatus {
    /// Relative change of the log-likelihood fell below the tolerance
    Converged,
    /// Iteration budget exhausted
    MaxIterations,
    /// Non-finite likelihood or singular Hessian
    NumericalFailure {
        /// What went wrong
        reason: String,
    },
}

/// Result of [`NewtonOptimizer::maximize`]
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodFit {
    /// Best parameter vector found
    pub beta: DVector<f64>,
    /// Log-likelihood at `beta`
    pub log_likelihood: f64,
    /// Log-likelihood gain over a Poisson process, in bits per spike
    pub normalized_log_likelihood: f64,
    /// Iterations run
    pub iterations: usize,
    /// How the run ended
    pub status: ConvergenceStatus,
}

impl LikelihoodFit {
    /// True when the run met the tolerance
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }
}

/// Newton-Raphson maximiser with a damped warm-up
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NewtonOptimizer {
    /// Iteration budget
    pub max_iterations: usize,
    /// Relative log-likelihood change at which the run stops
    pub tolerance: f64,
    /// Iterations run with the damped learning rate
    pub warmup_iterations: usize,
    /// Learning rate during warm-up
    pub warmup_learning_rate: f64,
}

impl Default for NewtonOptimizer {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            warmup_iterations: 10,
            warmup_learning_rate: 0.1,
        }
    }
}

struct Evaluation {
    log_likelihood: f64,
    gradient: DVector<f64>,
    hessian: DMatrix<f64>,
}

impl NewtonOptimizer {
    /// Validate optimizer settings
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(RuntimeError::invalid_parameter("max_iterations", "0", "> 0"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(RuntimeError::invalid_parameter(
                "tolerance",
                self.tolerance.to_string(),
                "> 0.0",
            ));
        }
        if !(self.warmup_learning_rate > 0.0 && self.warmup_learning_rate <= 1.0) {
            return Err(RuntimeError::invalid_parameter(
                "warmup_learning_rate",
                self.warmup_learning_rate.to_string(),
                "in (0, 1]",
            ));
        }
        Ok(())
    }

    fn evaluate(beta: &DVector<f64>, designs: &[DesignMatrix], rate: f64) -> Evaluation {
        let p = beta.len();
        let mut log_likelihood = 0.0;
        let mut gradient = DVector::zeros(p);
        let mut hessian = DMatrix::zeros(p, p);

        for design in designs {
            let intensity = (&design.x * beta).map(f64::exp);
            log_likelihood += design.sum_x_spikes.dot(beta) - rate * intensity.sum();
            gradient += &design.sum_x_spikes - design.x.tr_mul(&intensity) * rate;

            let mut weighted = design.x.clone();
            for mut column in weighted.column_iter_mut() {
                column.component_mul_assign(&intensity);
            }
            hessian -= design.x.tr_mul(&weighted) * rate;
        }

        Evaluation {
            log_likelihood,
            gradient,
            hessian,
        }
    }

    /// Maximise the log-likelihood summed over `designs`, starting at `beta0`.
    ///
    /// `lambda0` is in Hz and `dt_ms` is the sampling interval of the design
    /// rows. Never fails once iterating: numerical trouble and exhausted
    /// budgets are reported through [`LikelihoodFit::status`], together with
    /// the best finite estimate seen.
    pub fn maximize(
        &self,
        beta0: DVector<f64>,
        designs: &[DesignMatrix],
        lambda0: f64,
        dt_ms: f64,
    ) -> Result<LikelihoodFit> {
        self.validate()?;
        if let Some(design) = designs.iter().find(|d| d.parameter_count() != beta0.len()) {
            return Err(RuntimeError::invalid_parameter(
                "beta0",
                format!("{} parameters", beta0.len()),
                format!("{} design columns", design.parameter_count()),
            ));
        }

        let spike_count: usize = designs.iter().map(|d| d.spike_count).sum();
        let duration_s: f64 = designs.iter().map(|d| d.duration_s).sum();
        if spike_count == 0 {
            return Err(RuntimeError::no_spikes("likelihood"));
        }
        let n = spike_count as f64;
        let l_poisson = n * ((n / duration_s).ln() - 1.0);
        let rate = lambda0 * dt_ms / 1000.0;

        let mut beta = beta0;
        let mut best: Option<(DVector<f64>, f64, f64)> = None;
        let mut old_l = 1.0;
        let mut status = ConvergenceStatus::MaxIterations;
        let mut iterations = 0;

        for i in 0..self.max_iterations {
            iterations = i + 1;
            let learning_rate = if i < self.warmup_iterations {
                self.warmup_learning_rate
            } else {
                1.0
            };

            let eval = Self::evaluate(&beta, designs, rate);
            let l = eval.log_likelihood;
            let l_norm = (l - l_poisson) / LN_2 / n;
            if !l_norm.is_finite() {
                status = ConvergenceStatus::NumericalFailure {
                    reason: format!("non-finite log-likelihood at iteration {}", i),
                };
                break;
            }
            if best.as_ref().map_or(true, |(_, best_l, _)| l >= *best_l) {
                best = Some((beta.clone(), l, l_norm));
            }
            log::debug!("Newton iteration {}: L = {:.6}, L_norm = {:.6} bits/spike", i, l, l_norm);

            if i > 0 && ((l - old_l) / old_l).abs() < self.tolerance {
                status = ConvergenceStatus::Converged;
                break;
            }
            old_l = l;

            // beta - H^-1 G, with -H positive definite
            match solve_symmetric(-eval.hessian, &eval.gradient) {
                Some(step) => beta += step * learning_rate,
                None => {
                    status = ConvergenceStatus::NumericalFailure {
                        reason: format!("singular Hessian at iteration {}", i),
                    };
                    break;
                }
            }
        }

        if status == ConvergenceStatus::MaxIterations {
            log::warn!(
                "Likelihood maximisation did not converge after {} iterations",
                iterations
            );
        }

        let (beta, log_likelihood, normalized_log_likelihood) =
            best.unwrap_or((beta, f64::NAN, f64::NAN));
        Ok(LikelihoodFit {
            beta,
            log_likelihood,
            normalized_log_likelihood,
            iterations,
            status,
        })
    }
}
