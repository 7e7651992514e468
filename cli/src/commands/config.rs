use agic_core::config::{read_configuration, write_configuration, CompilerConfiguration};
use anyhow::{Context, Result};
use schemars::schema_for;
use std::fs::File;
use std::path::Path;

use crate::cli::Cli;
use crate::commands::print_output;

pub fn handle_check_command(config: &Path) -> Result<()> {
    let file = File::open(config).with_context(|| format!("Unable to open {}", config.display()))?;
    let configuration = read_configuration(file)
        .with_context(|| format!("Invalid configuration in {}", config.display()))?;

    write_configuration(&configuration, std::io::stdout().lock())?;
    Ok(())
}

pub fn handle_schema_command(cli: &Cli) -> Result<()> {
    print_output(&schema_for!(CompilerConfiguration), cli.output)
}
