//! Simulate a known GIF neuron, fit a fresh model on the output and compare.

use gif_runtime::{
    Experiment, FitConfig, Filter, GifModel, GifParams, NewtonOptimizer, RectLogSpacedFilter,
    Recording, Trace,
};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

const DT: f64 = 0.1;

fn white_noise(n: usize, mean: f64, std: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(mean, std).unwrap();
    (0..n).map(|_| normal.sample(&mut rng)).collect()
}

fn short_kernel() -> RectLogSpacedFilter {
    RectLogSpacedFilter::new(200.0, 2.0, 200.0, 7.0).unwrap()
}

fn record(model: &GifModel, current: Vec<f64>, seed: u64) -> Trace {
    let mut rng = StdRng::seed_from_u64(seed);
    let out = model.simulate(&current, model.params.el, &mut rng).unwrap();
    Trace::new(out.v, current, model.params.dt)
        .unwrap()
        .with_spike_times(&out.spike_times)
        .unwrap()
}

fn adapting_truth() -> GifModel {
    let params = GifParams {
        dt: DT,
        vr: -55.0,
        vt_star: -50.0,
        dv: 1.0,
        ..Default::default()
    };
    let eta = short_kernel().with_function(|t| 0.1 * (-t / 50.0).exp()).unwrap();
    let gamma = short_kernel().with_function(|t| 5.0 * (-t / 50.0).exp()).unwrap();
    GifModel::new(params, eta, gamma).unwrap()
}

#[test]
fn regression_recovers_passive_parameters_and_eta() {
    let truth = adapting_truth();
    let trace = record(&truth, white_noise(100_000, 0.2, 0.5, 1), 2);
    assert!(trace.spike_indices().len() > 50);

    let mut model = GifModel::new(GifParams::default(), short_kernel(), short_kernel()).unwrap();
    let fit = model.fit_subthreshold_dynamics(&[trace], 5.0).unwrap();

    assert!((fit.gl - truth.params.gl).abs() < 1e-6);
    assert!((fit.c - truth.params.c).abs() < 1e-6);
    assert!((fit.el - truth.params.el).abs() < 1e-4);
    for (fitted, expected) in fit.eta.iter().zip(truth.eta().coefficients()) {
        assert!((fitted - expected).abs() < 1e-5, "eta {} vs {}", fitted, expected);
    }
    assert!(fit.var_explained_dv > 0.999999);
    assert!(fit.var_explained_v > 0.9999);
}

#[test]
fn static_threshold_recovers_dv_and_vt_star() {
    let params = GifParams {
        dt: DT,
        vr: -55.0,
        vt_star: -50.0,
        dv: 1.0,
        ..Default::default()
    };
    let truth = GifModel::new(params.clone(), short_kernel(), short_kernel()).unwrap();
    let trace = record(&truth, white_noise(400_000, 0.16, 0.5, 3), 4);
    let spikes = trace.spike_indices().len();
    assert!(spikes > 200, "only {} spikes", spikes);

    // Passive parameters known, threshold unknown
    let start = GifParams {
        vt_star: -40.0,
        dv: 3.0,
        ..params
    };
    let mut model = GifModel::new(start, short_kernel(), short_kernel()).unwrap();
    let fit = model
        .fit_static_threshold(&[&trace], 50.0, &NewtonOptimizer::default())
        .unwrap();

    assert!(fit.likelihood.converged(), "{:?}", fit.likelihood.status);
    assert!((fit.dv - 1.0).abs() < 0.05, "DV = {}", fit.dv);
    assert!((fit.vt_star + 50.0).abs() < 0.05 * 50.0, "Vt* = {}", fit.vt_star);
    assert!(fit.likelihood.normalized_log_likelihood > 0.0);
}

#[test]
fn full_pipeline_on_an_experiment() {
    let truth = adapting_truth();
    let mut experiment = Experiment::new("synthetic", DT).unwrap();
    for seed in 0..2 {
        let trace = record(&truth, white_noise(100_000, 0.2, 0.5, 10 + seed), 20 + seed);
        experiment.add_training_trace(trace).unwrap();
    }

    let mut model = GifModel::new(GifParams::default(), short_kernel(), short_kernel()).unwrap();
    let report = model
        .fit_experiment(&experiment, &FitConfig::default())
        .unwrap();

    // Every post-refractory sample of the recording sits exactly at Vr
    assert!((report.reset.vr - truth.params.vr).abs() < 1e-9);
    assert_eq!(report.reset.trace_count, 2);

    assert!((report.subthreshold.gl - truth.params.gl).abs() < 1e-6);
    assert!((report.subthreshold.c - truth.params.c).abs() < 1e-6);

    let dynamic = &report.dynamic_threshold;
    assert!(dynamic.likelihood.log_likelihood.is_finite());
    assert!(dynamic.dv > 0.0);
    assert_eq!(dynamic.gamma.len(), model.gamma().basis_count());
    assert!(
        dynamic.likelihood.log_likelihood >= report.static_threshold.likelihood.log_likelihood - 1e-6,
        "gamma columns cannot lower the maximum"
    );

    let snapshot = model.snapshot();
    assert_eq!(snapshot.vr, report.reset.vr);
    assert!(snapshot.to_string().contains("DV"));
}

#[test]
fn dynamic_threshold_recovers_gamma() {
    let truth = adapting_truth();
    let traces: Vec<Trace> = (0..2)
        .map(|k| record(&truth, white_noise(300_000, 0.2, 0.5, 30 + k), 40 + k))
        .collect();

    // Sub-threshold dynamics known, threshold and gamma unknown
    let start = GifParams {
        vt_star: -40.0,
        dv: 3.0,
        ..truth.params.clone()
    };
    let mut model = GifModel::new(start, truth.eta().clone(), short_kernel()).unwrap();
    let optimizer = NewtonOptimizer::default();
    let static_fit = model.fit_static_threshold(&traces, 50.0, &optimizer).unwrap();
    let dynamic = model.fit_dynamic_threshold(&traces, &optimizer).unwrap();

    assert!(dynamic.likelihood.converged(), "{:?}", dynamic.likelihood.status);
    assert!((dynamic.dv - 1.0).abs() < 0.05, "DV = {}", dynamic.dv);
    assert!((dynamic.vt_star + 50.0).abs() < 0.05 * 50.0, "Vt* = {}", dynamic.vt_star);
    assert!(dynamic.likelihood.log_likelihood >= static_fit.likelihood.log_likelihood - 1e-6);

    // Early bins carry most of the spikes; the threshold moves up after each one
    let expected = truth.gamma().coefficients();
    for (k, (&fitted, &target)) in dynamic.gamma.iter().zip(expected).take(3).enumerate() {
        assert!(
            fitted > 0.5 * target && fitted < 2.0 * target,
            "gamma[{}] = {} vs {}",
            k,
            fitted,
            target
        );
    }
    assert_eq!(model.gamma().coefficients(), dynamic.gamma.as_slice());
}
