//! A single recorded episode of current and voltage

use crate::{error::*, time_to_index, Recording};

/// One recorded episode: injected current, membrane voltage and spikes
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    voltage: Vec<f64>,
    current: Vec<f64>,
    dt: f64,
    spikes: Vec<usize>,
    roi: Vec<bool>,
    use_trace: bool,
}

impl Trace {
    /// Create a trace without spikes, with the whole recording as region of interest
    pub fn new(voltage: Vec<f64>, current: Vec<f64>, dt: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TraceError::InvalidDt { dt });
        }
        if voltage.len() != current.len() {
            return Err(TraceError::LengthMismatch {
                voltage: voltage.len(),
                current: current.len(),
            });
        }
        let roi = vec![true; voltage.len()];
        Ok(Self {
            voltage,
            current,
            dt,
            spikes: Vec::new(),
            roi,
            use_trace: true,
        })
    }

    /// Attach known spike times (ms)
    pub fn with_spike_times(self, spike_times_ms: &[f64]) -> Result<Self> {
        if let Some(&time) = spike_times_ms.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
            return Err(TraceError::InvalidSpikeTime { time });
        }
        let indices = spike_times_ms
            .iter()
            .map(|&t| time_to_index(t, self.dt))
            .collect();
        self.with_spike_indices(indices)
    }

    /// Attach known spike sample indices
    pub fn with_spike_indices(mut self, mut indices: Vec<usize>) -> Result<Self> {
        indices.sort_unstable();
        indices.dedup();
        if let Some(&index) = indices.iter().find(|&&s| s >= self.voltage.len()) {
            return Err(TraceError::SpikeOutOfRange {
                index,
                len: self.voltage.len(),
            });
        }
        self.spikes = indices;
        Ok(self)
    }

    /// Detect spikes as upward crossings of `threshold` (mV).
    ///
    /// A crossing needs the previous sample strictly below `threshold`, so a
    /// plateau sitting at the threshold counts once. After each detection the
    /// next `refractory_ms` are skipped so a single action potential is not
    /// counted twice. Returns the number of spikes.
    pub fn detect_spikes(&mut self, threshold: f64, refractory_ms: f64) -> usize {
        let skip = time_to_index(refractory_ms, self.dt);
        let v = &self.voltage;
        let mut spikes = Vec::new();
        let mut t = 1;
        while t < v.len() {
            if v[t] >= threshold && v[t - 1] < threshold {
                spikes.push(t);
                t += skip;
            }
            t += 1;
        }
        log::debug!("Detected {} spikes (threshold {} mV)", spikes.len(), threshold);
        self.spikes = spikes;
        self.spikes.len()
    }

    /// Restrict the region of interest to the given `[start, end)` intervals (ms)
    pub fn set_roi(&mut self, intervals_ms: &[(f64, f64)]) -> Result<()> {
        let n = self.voltage.len();
        let mut roi = vec![false; n];
        for &(start, end) in intervals_ms {
            if !(end >= start && start >= 0.0) {
                return Err(TraceError::InvalidInterval { start, end });
            }
            let lb = time_to_index(start, self.dt).min(n);
            let ub = time_to_index(end, self.dt).min(n);
            roi[lb..ub].iter_mut().for_each(|r| *r = true);
        }
        self.roi = roi;
        Ok(())
    }

    /// Reset the region of interest to the whole trace
    pub fn clear_roi(&mut self) {
        self.roi = vec![true; self.voltage.len()];
    }

    /// Whether the trace takes part in fitting
    pub fn use_trace(&self) -> bool {
        self.use_trace
    }

    /// Include or exclude the trace from fitting
    pub fn set_use_trace(&mut self, use_trace: bool) {
        self.use_trace = use_trace;
    }
}

impl Recording for Trace {
    fn dt(&self) -> f64 {
        self.dt
    }

    fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    fn current(&self) -> &[f64] {
        &self.current
    }

    fn spike_indices(&self) -> &[usize] {
        &self.spikes
    }

    fn roi(&self) -> &[bool] {
        &self.roi
    }

    fn use_trace(&self) -> bool {
        self.use_trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flat_trace(n: usize, dt: f64) -> Trace {
        Trace::new(vec![-70.0; n], vec![0.0; n], dt).unwrap()
    }

    #[test]
    fn test_trace_validation() {
        assert!(matches!(
            Trace::new(vec![0.0; 3], vec![0.0; 2], 0.1),
            Err(TraceError::LengthMismatch { voltage: 3, current: 2 })
        ));
        assert!(matches!(
            Trace::new(vec![0.0; 3], vec![0.0; 3], 0.0),
            Err(TraceError::InvalidDt { .. })
        ));
        assert!(matches!(
            flat_trace(10, 1.0).with_spike_indices(vec![3, 10]),
            Err(TraceError::SpikeOutOfRange { index: 10, len: 10 })
        ));
    }

    #[test]
    fn test_spike_times_round_trip() {
        let trace = flat_trace(1000, 0.1).with_spike_times(&[50.0, 12.3, 12.3]).unwrap();
        assert_eq!(trace.spike_indices(), &[123, 500]);
        let times = trace.spike_times();
        assert!((times[0] - 12.3).abs() < 1e-9);
        assert!((times[1] - 50.0).abs() < 1e-9);
        assert_eq!(trace.duration(), 100.0);
    }

    #[test]
    fn test_detect_spikes_respects_refractory() {
        let mut v = vec![-70.0; 100];
        // Two crossings 2 samples apart, then one far away
        v[10] = 20.0;
        v[12] = 20.0;
        v[60] = 20.0;
        let mut trace = Trace::new(v, vec![0.0; 100], 1.0).unwrap();
        let n = trace.detect_spikes(0.0, 3.0);
        assert_eq!(n, 2);
        assert_eq!(trace.spike_indices(), &[10, 60]);
    }

    #[test]
    fn test_detect_spikes_plateau_at_threshold() {
        // Refractory samples of a simulated trace hold exactly 0 mV
        let mut v = vec![-60.0; 100];
        v[11..50].iter_mut().for_each(|x| *x = 0.0);
        let mut trace = Trace::new(v, vec![0.0; 100], 0.1).unwrap();
        assert_eq!(trace.detect_spikes(0.0, 3.0), 1);
        assert_eq!(trace.spike_indices(), &[11]);
    }

    #[test]
    fn test_negative_spike_times_rejected() {
        assert!(matches!(
            flat_trace(100, 0.1).with_spike_times(&[-3.0]),
            Err(TraceError::InvalidSpikeTime { time }) if time == -3.0
        ));
        assert!(matches!(
            flat_trace(100, 0.1).with_spike_times(&[1.0, f64::INFINITY]),
            Err(TraceError::InvalidSpikeTime { .. })
        ));
    }

    #[test]
    fn test_valid_region_excludes_windows() {
        let trace = flat_trace(100, 1.0).with_spike_indices(vec![50]).unwrap();

        let region = trace.valid_region(5.0, 4.0);
        assert_eq!(region.len(), 100 - 9);
        assert!(region.contains(&44));
        assert!(!region.contains(&45));
        assert!(!region.contains(&53));
        assert!(region.contains(&54));

        // Negative window start keeps the spike sample itself
        let region = trace.valid_region(-1.0, 4.0);
        assert!(region.contains(&50));
        assert!(!region.contains(&51));
        assert!(!region.contains(&53));
        assert!(region.contains(&54));
    }

    #[test]
    fn test_roi_restricts_statistics() {
        let mut trace = flat_trace(1000, 0.1).with_spike_indices(vec![100, 600]).unwrap();
        trace.set_roi(&[(0.0, 50.0)]).unwrap();
        assert_eq!(trace.spike_count_in_roi(), 1);
        assert!((trace.roi_duration() - 50.0).abs() < 1e-9);
        assert!(trace.valid_region(0.0, 0.0).iter().all(|&i| i < 500));

        assert!(trace.set_roi(&[(10.0, 5.0)]).is_err());
        trace.clear_roi();
        assert_eq!(trace.spike_count_in_roi(), 2);
    }

    #[test]
    fn test_spike_triggered_average() {
        let dt = 0.5;
        let n = 400;
        let mut v = vec![-60.0; n];
        for &s in &[100usize, 250] {
            v[s] = 30.0;
            v[s + 8] = -52.0;
        }
        let trace = Trace::new(v, vec![0.0; n], dt)
            .unwrap()
            .with_spike_indices(vec![100, 250, 395])
            .unwrap();

        let sta = trace.spike_triggered_average().unwrap();
        // The last spike has no room for the post-spike window
        assert_eq!(sta.spike_count, 2);
        let before = time_to_index(crate::STA_BEFORE_MS, dt);
        assert_eq!(sta.support[before], 0.0);
        assert_eq!(sta.average[before], 30.0);
        assert_eq!(sta.average[before + 8], -52.0);
        assert!((sta.support[before + 8] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_spike_triggered_average_without_spikes() {
        assert!(flat_trace(100, 0.1).spike_triggered_average().is_none());
    }

    proptest! {
        #[test]
        fn prop_valid_region_never_contains_refractory_samples(
            spikes in proptest::collection::vec(0usize..500, 0..10),
            after in 0usize..20,
        ) {
            let trace = flat_trace(500, 1.0).with_spike_indices(spikes).unwrap();
            let region = trace.valid_region(-1.0, after as f64);
            for &s in trace.spike_indices() {
                for k in 1..after {
                    prop_assert!(!region.contains(&(s + k)));
                }
            }
            prop_assert!(region.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
