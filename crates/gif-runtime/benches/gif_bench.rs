use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use gif_runtime::{GifModel, NewtonOptimizer, Trace};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

fn noisy_current(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.3, 0.5).expect("bench noise");
    (0..n).map(|_| normal.sample(&mut rng)).collect()
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("gif_simulation");
    let model = GifModel::default();

    for &seconds in &[1usize, 10] {
        let n = seconds * 10_000; // dt = 0.1 ms
        let current = noisy_current(n, 1);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("stochastic", seconds), &current, |b, current| {
            b.iter_batched(
                || StdRng::seed_from_u64(1234),
                |mut rng| {
                    let _out = model.simulate(current, -65.0, &mut rng).unwrap();
                },
                BatchSize::SmallInput,
            );
        });

        let spikes = model
            .simulate(&current, -65.0, &mut StdRng::seed_from_u64(1234))
            .expect("bench simulation")
            .spike_times;
        group.bench_with_input(BenchmarkId::new("forced", seconds), &current, |b, current| {
            b.iter(|| model.simulate_forced_spikes(current, -65.0, &spikes).unwrap());
        });
    }

    group.finish();
}

fn bench_threshold_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("gif_threshold_fit");
    // Keep the recording short so the bench stays fast in CI
    let truth = GifModel::default();
    let current = noisy_current(20_000, 2);
    let out = truth
        .simulate(&current, -65.0, &mut StdRng::seed_from_u64(5))
        .expect("bench simulation");
    let trace = Trace::new(out.v, current, 0.1)
        .and_then(|t| t.with_spike_times(&out.spike_times))
        .expect("bench trace");

    group.bench_function("static", |b| {
        b.iter_batched(
            || truth.clone(),
            |mut model| {
                let _fit = model
                    .fit_static_threshold(&[&trace], 50.0, &NewtonOptimizer::default())
                    .unwrap();
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_simulation, bench_threshold_fit);
criterion_main!(benches);
