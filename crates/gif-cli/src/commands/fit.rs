//! `gif fit`: run the four-stage fitting pipeline
//!
//! Example:
//!   gif fit --traces cell.json --json
//!   gif --config truth.toml fit --seed 7
//!
//! Traces are read from a JSON array of `{dt, voltage, current, spike_times?}`
//! objects (a single object is accepted too). Spikes are detected on the
//! voltage when `spike_times` is absent. Without `--traces` the model from the
//! config file is simulated and refitted from scratch.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use gif_runtime::{
    Experiment, FitReport, ParameterSnapshot, Recording, Trace,
};
use gif_trace::{DEFAULT_DETECTION_REFRACTORY, DEFAULT_SPIKE_THRESHOLD};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    commands::write_json,
    config::CliConfig,
    error::{CliError, CliResult},
};

/// Fit a model on recorded or synthetic traces
#[derive(Args, Debug)]
pub struct FitCommand {
    /// JSON file with the recorded traces
    #[arg(short, long)]
    pub traces: Option<PathBuf>,

    /// Seed of the synthetic recordings
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the result as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One recorded episode as read from disk
#[derive(Debug, Clone, Deserialize)]
pub struct TraceRecord {
    /// Sampling interval (ms)
    pub dt: f64,
    /// Membrane voltage (mV)
    #[serde(alias = "v")]
    pub voltage: Vec<f64>,
    /// Injected current (nA)
    pub current: Vec<f64>,
    /// Spike times (ms); detected on the voltage when absent
    #[serde(default)]
    pub spike_times: Option<Vec<f64>>,
    /// Hold the trace out of the fit and use it for validation
    #[serde(default)]
    pub test: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TraceFile {
    Many(Vec<TraceRecord>),
    One(TraceRecord),
}

impl TraceRecord {
    /// Convert to a [`Trace`], detecting spikes when none were recorded
    pub fn into_trace(self) -> CliResult<Trace> {
        let trace = Trace::new(self.voltage, self.current, self.dt)?;
        match self.spike_times {
            Some(times) => Ok(trace.with_spike_times(&times)?),
            None => {
                let mut trace = trace;
                trace.detect_spikes(DEFAULT_SPIKE_THRESHOLD, DEFAULT_DETECTION_REFRACTORY);
                Ok(trace)
            }
        }
    }
}

/// Read an experiment from a trace file
pub fn load_experiment(path: &Path) -> CliResult<Experiment> {
    if !path.exists() {
        return Err(CliError::missing_resource(format!(
            "trace file {} not found",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read trace file {}", path.display()))?;
    let records = match serde_json::from_str::<TraceFile>(&content)
        .with_context(|| format!("{} is not a valid trace file", path.display()))?
    {
        TraceFile::Many(records) => records,
        TraceFile::One(record) => vec![record],
    };
    let dt = records
        .first()
        .ok_or_else(|| CliError::invalid_args(format!("{} holds no traces", path.display())))?
        .dt;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let mut experiment = Experiment::new(name, dt)?;
    for record in records {
        let test = record.test;
        let trace = record.into_trace()?;
        if test {
            experiment.add_test_trace(trace)?;
        } else {
            experiment.add_training_trace(trace)?;
        }
    }
    Ok(experiment)
}

/// Simulate the configured model to produce training traces
pub fn synthetic_experiment(config: &CliConfig, seed: u64) -> CliResult<Experiment> {
    if config.synthetic.traces == 0 {
        return Err(CliError::config("synthetic.traces must be at least 1"));
    }
    let truth = config.build_model()?;
    let dt = truth.params.dt;
    let mut experiment = Experiment::new("synthetic", dt)?;

    for k in 0..config.synthetic.traces as u64 {
        let stream = seed.wrapping_add(2 * k);
        let current = config.stimulus.generate(dt, stream)?;
        let mut rng = StdRng::seed_from_u64(stream.wrapping_add(1));
        let out = truth.simulate(&current, truth.params.el, &mut rng)?;
        let trace = Trace::new(out.v, current, dt)?.with_spike_times(&out.spike_times)?;
        info!("Synthetic trace {}: {} spikes", k, trace.spike_indices().len());
        experiment.add_training_trace(trace)?;
    }
    Ok(experiment)
}

/// What `gif fit` reports
#[derive(Debug, Serialize)]
pub struct FitSummary {
    /// Fitted parameters
    pub model: ParameterSnapshot,
    /// Training traces used
    pub traces: usize,
    /// Spikes in the reset average
    pub spikes: usize,
    /// Variance of dV/dt explained by the regression
    pub var_explained_dv: f64,
    /// Voltage variance explained on the training traces
    pub var_explained_v: f64,
    /// Voltage variance explained on held-out traces
    pub test_var_explained_v: Option<f64>,
    /// Log-likelihood of the static threshold model
    pub static_log_likelihood: f64,
    /// Log-likelihood of the dynamic threshold model
    pub dynamic_log_likelihood: f64,
    /// Gain over a Poisson process (bits per spike)
    pub bits_per_spike: f64,
    /// Whether both likelihood fits converged
    pub converged: bool,
}

impl FitSummary {
    fn new(report: &FitReport, model: ParameterSnapshot, test_var_explained_v: Option<f64>) -> Self {
        Self {
            model,
            traces: report.reset.trace_count,
            spikes: report.reset.spike_count,
            var_explained_dv: report.subthreshold.var_explained_dv,
            var_explained_v: report.subthreshold.var_explained_v,
            test_var_explained_v,
            static_log_likelihood: report.static_threshold.likelihood.log_likelihood,
            dynamic_log_likelihood: report.dynamic_threshold.likelihood.log_likelihood,
            bits_per_spike: report.dynamic_threshold.likelihood.normalized_log_likelihood,
            converged: report.converged(),
        }
    }
}

impl FitCommand {
    /// Fit and report
    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        let experiment = match &self.traces {
            Some(path) => load_experiment(path)?,
            None => {
                info!("No traces given, fitting synthetic recordings of the configured model");
                synthetic_experiment(config, self.seed)?
            }
        };

        let mut model = config.blank_model()?;
        let report = model.fit_experiment(&experiment, &config.fit)?;

        let test_var = if experiment.test_set().is_empty() {
            None
        } else {
            Some(model.voltage_variance_explained(experiment.test_set())?)
        };
        if !report.converged() {
            warn!("Likelihood optimisation did not converge");
        }

        let summary = FitSummary::new(&report, model.snapshot(), test_var);

        if self.json {
            write_json(&summary, None)?;
        } else {
            println!("{}", summary.model);
            println!();
            println!("traces:            {}", summary.traces);
            println!("spikes:            {}", summary.spikes);
            println!("var explained dV:  {:.4}", summary.var_explained_dv);
            println!("var explained V:   {:.4}", summary.var_explained_v);
            if let Some(v) = summary.test_var_explained_v {
                println!("test var expl. V:  {:.4}", v);
            }
            println!("log L (static):    {:.3}", summary.static_log_likelihood);
            println!("log L (dynamic):   {:.3}", summary.dynamic_log_likelihood);
            println!("bits per spike:    {:.4}", summary.bits_per_spike);
            println!("converged:         {}", summary.converged);
        }

        if let Some(path) = &self.output {
            write_json(&summary, Some(path))?;
            info!("Fit written to {}", path.display());
        }
        Ok(())
    }
}
