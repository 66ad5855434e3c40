//! Read-only interface to a recorded episode

use crate::{time_to_index, STA_AFTER_MS, STA_BEFORE_MS};

/// Spike-triggered average of the membrane voltage
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeTriggeredAverage {
    /// Time relative to the spike (ms)
    pub support: Vec<f64>,
    /// Average voltage (mV)
    pub average: Vec<f64>,
    /// Number of spikes averaged
    pub spike_count: usize,
}

/// Interface the fitting pipeline uses to read a recorded episode.
///
/// Implementors provide the raw samples, detected spikes and the
/// region-of-interest mask; exclusion windows, spike-triggered averages and
/// rate statistics are derived from those.
pub trait Recording: Send + Sync {
    /// Sampling interval (ms)
    fn dt(&self) -> f64;

    /// Membrane voltage samples (mV)
    fn voltage(&self) -> &[f64];

    /// Injected current samples (nA)
    fn current(&self) -> &[f64];

    /// Spike sample indices, ascending
    fn spike_indices(&self) -> &[usize];

    /// Region-of-interest mask, one flag per sample
    fn roi(&self) -> &[bool];

    /// Whether the recording takes part in fitting
    fn use_trace(&self) -> bool {
        true
    }

    /// Number of samples
    fn len(&self) -> usize {
        self.voltage().len()
    }

    /// True when the recording has no samples
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration (ms)
    fn duration(&self) -> f64 {
        self.len() as f64 * self.dt()
    }

    /// Spike times (ms)
    fn spike_times(&self) -> Vec<f64> {
        let dt = self.dt();
        self.spike_indices().iter().map(|&s| s as f64 * dt).collect()
    }

    /// Per-sample spike flags
    fn spike_train(&self) -> Vec<bool> {
        let mut train = vec![false; self.len()];
        for &s in self.spike_indices() {
            if let Some(flag) = train.get_mut(s) {
                *flag = true;
            }
        }
        train
    }

    /// Sample indices inside the region of interest and away from spikes.
    ///
    /// For each spike `s`, samples in `[s - before, s + after)` are dropped,
    /// with both windows rounded to whole samples. A negative `before_ms`
    /// moves the start of the window past the spike, so `-dt` keeps the
    /// spike sample itself while still removing the refractory period.
    fn valid_region(&self, before_ms: f64, after_ms: f64) -> Vec<usize> {
        let n = self.len();
        let dt = self.dt();
        let before = (before_ms / dt).round() as isize;
        let after = (after_ms / dt).round() as isize;

        let mut keep: Vec<bool> = self.roi().to_vec();
        keep.resize(n, false);
        for &s in self.spike_indices() {
            let lb = (s as isize - before).max(0) as usize;
            let ub = ((s as isize + after).max(0) as usize).min(n);
            if lb < ub {
                keep[lb..ub].iter_mut().for_each(|k| *k = false);
            }
        }
        keep.iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect()
    }

    /// Spikes that fall inside the region of interest
    fn spike_count_in_roi(&self) -> usize {
        let roi = self.roi();
        self.spike_indices()
            .iter()
            .filter(|&&s| roi.get(s).copied().unwrap_or(false))
            .count()
    }

    /// Total duration of the region of interest (ms)
    fn roi_duration(&self) -> f64 {
        self.roi().iter().filter(|&&r| r).count() as f64 * self.dt()
    }

    /// Average voltage waveform around spikes in the region of interest.
    ///
    /// Uses spikes whose whole window fits inside the trace. Returns `None`
    /// when no spike qualifies.
    fn spike_triggered_average(&self) -> Option<SpikeTriggeredAverage> {
        let dt = self.dt();
        let before = time_to_index(STA_BEFORE_MS, dt);
        let after = time_to_index(STA_AFTER_MS, dt);
        let v = self.voltage();
        let roi = self.roi();

        let mut sum = vec![0.0; before + after];
        let mut spike_count = 0;
        for &s in self.spike_indices() {
            let in_roi = roi.get(s).copied().unwrap_or(false);
            if in_roi && s > before && s + after < v.len() {
                for (acc, x) in sum.iter_mut().zip(&v[s - before..s + after]) {
                    *acc += x;
                }
                spike_count += 1;
            }
        }
        if spike_count == 0 {
            return None;
        }

        let average = sum.into_iter().map(|x| x / spike_count as f64).collect();
        let support = (0..before + after)
            .map(|k| (k as f64 - before as f64) * dt)
            .collect();
        Some(SpikeTriggeredAverage {
            support,
            average,
            spike_count,
        })
    }
}

impl<T: Recording + ?Sized> Recording for &T {
    fn dt(&self) -> f64 {
        (**self).dt()
    }

    fn voltage(&self) -> &[f64] {
        (**self).voltage()
    }

    fn current(&self) -> &[f64] {
        (**self).current()
    }

    fn spike_indices(&self) -> &[usize] {
        (**self).spike_indices()
    }

    fn roi(&self) -> &[bool] {
        (**self).roi()
    }

    fn use_trace(&self) -> bool {
        (**self).use_trace()
    }
}
