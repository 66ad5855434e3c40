//! Kernel expanded on rectangular, log-spaced basis functions

use nalgebra::DMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{error::*, time_to_index, Filter, InterpolatedKernel};

/// Kernel made of adjacent rectangular bins whose width grows exponentially.
///
/// Bin `k` (1-based) has width `min(binsize_lb * exp(k / slope), binsize_ub)`
/// and bins are added until their cumulative length exceeds `length`. Short
/// bins near the spike resolve fast dynamics, long bins cover slow
/// adaptation with few coefficients.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RectLogSpacedFilter {
    length: f64,
    binsize_lb: f64,
    binsize_ub: f64,
    slope: f64,
    /// Bin edges (ms), starting at zero
    edges: Vec<f64>,
    coefficients: Vec<f64>,
}

impl Default for RectLogSpacedFilter {
    fn default() -> Self {
        Self::build(1000.0, 2.0, 1000.0, 7.0)
    }
}

impl RectLogSpacedFilter {
    /// Create a zeroed kernel with validated basis parameters
    pub fn new(length: f64, binsize_lb: f64, binsize_ub: f64, slope: f64) -> Result<Self> {
        for (name, value) in [
            ("length", length),
            ("binsize_lb", binsize_lb),
            ("binsize_ub", binsize_ub),
            ("slope", slope),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(FilterError::invalid_parameter(name, value.to_string(), "> 0.0"));
            }
        }
        if binsize_ub < binsize_lb {
            return Err(FilterError::invalid_parameter(
                "binsize_ub",
                format!("{} (with binsize_lb={})", binsize_ub, binsize_lb),
                ">= binsize_lb",
            ));
        }
        Ok(Self::build(length, binsize_lb, binsize_ub, slope))
    }

    fn build(length: f64, binsize_lb: f64, binsize_ub: f64, slope: f64) -> Self {
        let mut edges = vec![0.0];
        let mut total = 0.0;
        let mut k = 1.0;
        while total <= length {
            total += (binsize_lb * (k / slope).exp()).min(binsize_ub);
            edges.push(total);
            k += 1.0;
        }
        let coefficients = vec![0.0; edges.len() - 1];
        Self {
            length,
            binsize_lb,
            binsize_ub,
            slope,
            edges,
            coefficients,
        }
    }

    /// Bin edges in ms
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Nominal kernel length (ms); the last bin may overshoot it
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Smallest and largest allowed bin width (ms)
    pub fn binsize_bounds(&self) -> (f64, f64) {
        (self.binsize_lb, self.binsize_ub)
    }

    /// Growth rate of the bin widths
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Centre of each bin (ms)
    pub fn bin_centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Approximate `f` by sampling it at the bin centres
    pub fn set_from_function(&mut self, f: impl Fn(f64) -> f64) -> Result<()> {
        let coefficients: Vec<f64> = self.bin_centers().into_iter().map(f).collect();
        self.set_coefficients(&coefficients)
    }

    /// Builder-style variant of [`RectLogSpacedFilter::set_from_function`]
    pub fn with_function(mut self, f: impl Fn(f64) -> f64) -> Result<Self> {
        self.set_from_function(f)?;
        Ok(self)
    }

    fn edge_indices(&self, dt: f64) -> Vec<usize> {
        self.edges.iter().map(|&e| time_to_index(e, dt)).collect()
    }

    /// Count of spikes covered by basis `l` at each of `rows` samples.
    ///
    /// Built as a difference array so the cost is linear in samples plus
    /// spikes, independently of bin widths.
    fn basis_column(&self, l: usize, spikes: &[usize], edges: &[usize], rows: usize) -> Vec<f64> {
        let mut diff = vec![0.0; rows + 1];
        for &s in spikes {
            let lb = s + edges[l];
            let ub = (s + edges[l + 1]).min(rows);
            if lb < ub {
                diff[lb] += 1.0;
                diff[ub] -= 1.0;
            }
        }
        let mut acc = 0.0;
        diff.truncate(rows);
        for d in diff.iter_mut() {
            acc += *d;
            *d = acc;
        }
        diff
    }
}

impl Filter for RectLogSpacedFilter {
    fn basis_count(&self) -> usize {
        self.coefficients.len()
    }

    fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    fn set_coefficients(&mut self, coefficients: &[f64]) -> Result<()> {
        if coefficients.len() != self.coefficients.len() {
            return Err(FilterError::CoefficientCount {
                expected: self.coefficients.len(),
                got: coefficients.len(),
            });
        }
        if let Some((index, &value)) = coefficients.iter().enumerate().find(|(_, c)| !c.is_finite()) {
            return Err(FilterError::NonFinite { index, value });
        }
        self.coefficients.copy_from_slice(coefficients);
        Ok(())
    }

    fn zero_out(&mut self) {
        self.coefficients.iter_mut().for_each(|c| *c = 0.0);
    }

    fn interpolate(&self, dt: f64) -> InterpolatedKernel {
        let edges = self.edge_indices(dt);
        let len = edges[edges.len() - 1] - edges[0];
        let mut values = vec![0.0; len];
        for (l, &c) in self.coefficients.iter().enumerate() {
            values[edges[l]..edges[l + 1]].iter_mut().for_each(|v| *v = c);
        }
        let support = (0..len).map(|k| k as f64 * dt).collect();
        InterpolatedKernel { support, values }
    }

    fn convolve_spike_train(&self, spike_times_ms: &[f64], duration_ms: f64, dt: f64) -> DMatrix<f64> {
        let rows = time_to_index(duration_ms, dt);
        let edges = self.edge_indices(dt);
        let spikes: Vec<usize> = spike_times_ms.iter().map(|&t| time_to_index(t, dt)).collect();

        let mut x = DMatrix::zeros(rows, self.basis_count());
        for l in 0..self.basis_count() {
            let column = self.basis_column(l, &spikes, &edges, rows);
            x.column_mut(l).copy_from_slice(&column);
        }
        x
    }

    fn convolve_spike_train_rows(
        &self,
        spike_times_ms: &[f64],
        duration_ms: f64,
        dt: f64,
        rows: &[usize],
    ) -> DMatrix<f64> {
        let total = time_to_index(duration_ms, dt);
        let edges = self.edge_indices(dt);
        let spikes: Vec<usize> = spike_times_ms.iter().map(|&t| time_to_index(t, dt)).collect();

        let mut x = DMatrix::zeros(rows.len(), self.basis_count());
        for l in 0..self.basis_count() {
            let column = self.basis_column(l, &spikes, &edges, total);
            for (r, &row) in rows.iter().enumerate() {
                x[(r, l)] = column.get(row).copied().unwrap_or(0.0);
            }
        }
        x
    }
}
