//! `gif simulate`: drive the configured model with white noise
//!
//! Example:
//!   gif --config cell.toml simulate --seed 3 --output run.json
//!
//! The output file holds one trace and can be passed back to
//! `gif fit --traces`.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tracing::info;

use rand::{rngs::StdRng, SeedableRng};

use crate::{commands::write_json, config::CliConfig, error::CliResult};

/// Simulate the configured model
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// Seed of the stimulus and of the spike generator
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Write the simulated trace as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One simulated episode as written to disk
#[derive(Debug, Serialize)]
pub struct SimulationRecord {
    /// Sampling interval (ms)
    pub dt: f64,
    /// Sample times (ms)
    pub time: Vec<f64>,
    /// Injected current (nA)
    pub current: Vec<f64>,
    /// Membrane voltage (mV)
    pub v: Vec<f64>,
    /// Firing threshold (mV)
    pub v_t: Vec<f64>,
    /// Spike times (ms)
    pub spike_times: Vec<f64>,
}

impl SimulateCommand {
    /// Run the simulation and report or save it
    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        let model = config.build_model()?;
        let dt = model.params.dt;
        let current = config.stimulus.generate(dt, self.seed)?;

        // Separate stream so the spikes do not depend on how the current was drawn
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        let out = model.simulate(&current, model.params.el, &mut rng)?;

        let duration_s = current.len() as f64 * dt / 1000.0;
        info!(
            "Simulated {} ms: {} spikes ({:.2} Hz)",
            current.len() as f64 * dt,
            out.spike_times.len(),
            out.spike_times.len() as f64 / duration_s
        );

        match self.output {
            Some(path) => {
                let record = SimulationRecord {
                    dt,
                    time: out.time,
                    current,
                    v: out.v,
                    v_t: out.v_t,
                    spike_times: out.spike_times,
                };
                write_json(&record, Some(&path))?;
                info!("Trace written to {}", path.display());
            }
            None => {
                println!("spikes: {}", out.spike_times.len());
                println!("rate: {:.2} Hz", out.spike_times.len() as f64 / duration_s);
            }
        }
        Ok(())
    }
}
