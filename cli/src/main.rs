mod cli;
mod commands;
mod table_theme;

use agic_core::instrumentation::init_instrumentation;
use anyhow::Result;
use clap::Parser;
use cli::Cli;
use commands::handle_command;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        init_instrumentation("debug");
    } else {
        init_instrumentation("info");
    }

    handle_command(&cli)
}
