//! CLI command implementations for gif

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{config::CliConfig, error::CliResult};

pub mod fit;
pub mod params;
pub mod simulate;

/// gif - simulate and fit generalized integrate-and-fire neurons
#[derive(Parser, Debug)]
#[command(
    name = "gif",
    version,
    about = "Simulate and fit generalized integrate-and-fire neurons",
    long_about = "gif simulates GIF neurons with spike-triggered current and threshold \
                  adaptation, and fits every model parameter on recorded current-clamp \
                  traces: reset, passive membrane and eta by regression, threshold \
                  and gamma by maximum likelihood."
)]
pub struct GifCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "GIF_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the configured model parameters
    #[command(alias = "show")]
    Params(params::ParamsCommand),

    /// Simulate the configured model under a noisy current
    #[command(alias = "sim")]
    Simulate(simulate::SimulateCommand),

    /// Fit a model on recorded or synthetic traces
    Fit(fit::FitCommand),
}

impl GifCli {
    /// Execute the CLI command
    pub fn execute(self) -> CliResult<()> {
        let config = CliConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Params(cmd) => cmd.execute(&config),
            Commands::Simulate(cmd) => cmd.execute(&config),
            Commands::Fit(cmd) => cmd.execute(&config),
        }
    }
}

/// Write `value` as pretty JSON to `path`, or to stdout when `path` is `None`
pub(crate) fn write_json<T: serde::Serialize>(value: &T, path: Option<&std::path::Path>) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, text)?;
        }
        None => println!("{}", text),
    }
    Ok(())
}
