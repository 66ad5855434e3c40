//! # gif - simulate and fit generalized integrate-and-fire neurons
//!
//! Prints model parameters, simulates a neuron driven by a noisy current
//! and fits a model on recorded (or synthetic) voltage traces.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gif_cli::{commands::GifCli, error::CliResult};

fn main() -> CliResult<()> {
    let cli = GifCli::parse();

    // Logs go to stderr so stdout stays machine readable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(err) = cli.execute() {
        error!("Command failed: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
