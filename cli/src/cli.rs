use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agicctl",
    about = "Application Gateway ingress compiler tool",
    version,
    long_about = "A command-line tool for compiling Kubernetes ingress snapshots into Application Gateway configuration and for emitting the custom resource definitions the compiler reads."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(short, long, global = true, default_value = "json", env = "AGIC_OUTPUT")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true, env = "AGIC_VERBOSE")]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a snapshot into an Application Gateway document
    Build {
        /// Compiler configuration file
        #[arg(short, long, env = "AGIC_CONFIG")]
        config: PathBuf,
        /// Snapshot file with the cluster objects and the deployed gateway
        #[arg(short, long, env = "AGIC_SNAPSHOT")]
        snapshot: PathBuf,
        /// Timestamp to stamp on the document instead of the current time (RFC 3339)
        #[arg(long, env = "AGIC_NOW")]
        now: Option<DateTime<Utc>>,
        /// Do not print the events table
        #[arg(short, long, env = "AGIC_QUIET")]
        quiet: bool,
    },
    /// Work with compiler configuration files
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print the custom resource definitions the compiler reads
    Crds,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate a configuration file and print it with defaults filled in
    Check {
        /// Compiler configuration file
        #[arg(short, long, env = "AGIC_CONFIG")]
        config: PathBuf,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}
