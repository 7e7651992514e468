pub mod build;
pub mod config;
pub mod crds;

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::cli::{Cli, Commands, ConfigAction, OutputFormat};

/// Main command dispatcher
pub fn handle_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Build {
            ref config,
            ref snapshot,
            now,
            quiet,
        } => {
            build::handle_build_command(config, snapshot, *now, *quiet, cli)?;
        }
        Commands::Config { ref action } => match action {
            ConfigAction::Check { ref config } => config::handle_check_command(config)?,
            ConfigAction::Schema => config::handle_schema_command(cli)?,
        },
        Commands::Crds => {
            crds::handle_crds_command()?;
        }
    }

    Ok(())
}

/// Writes `value` to stdout in the requested format.
pub fn print_output<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        }
        OutputFormat::Yaml => serde_yaml::to_writer(&mut stdout, value)?,
    }
    Ok(())
}
