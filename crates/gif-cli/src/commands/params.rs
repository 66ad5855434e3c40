//! `gif params`: show the model a config file describes

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::{
    config::CliConfig,
    commands::write_json,
    error::CliResult,
};

/// Print the configured model parameters
#[derive(Args, Debug)]
pub struct ParamsCommand {
    /// Print the parameter snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the effective configuration to this TOML file
    #[arg(long)]
    pub save: Option<PathBuf>,
}

impl ParamsCommand {
    /// Print the snapshot of the configured model
    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        let model = config.build_model()?;
        let snapshot = model.snapshot();

        if self.json {
            write_json(&snapshot, None)?;
        } else {
            println!("{}", snapshot);
        }

        if let Some(path) = self.save {
            config.save_to_file(&path)?;
            info!("Configuration written to {}", path.display());
        }
        Ok(())
    }
}
