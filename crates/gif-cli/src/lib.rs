//! Library half of the `gif` binary: command definitions, configuration
//! files and error types.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::GifCli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
