//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run script test units in isolated interpreter processes
#[derive(Parser, Debug)]
#[command(name = "isorun")]
#[command(version = "0.1.0")]
#[command(about = "Run script test units in isolation with bounded concurrency")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run test units
    Run(RunArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Unit files to run
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Per-unit time budget in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Maximum units in flight
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Scheduling strategy (batch, continuous)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Report format (console, json)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Source lines shown around a failing line
    #[arg(long)]
    pub max_lines: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Interpreter program
    #[arg(long)]
    pub program: Option<String>,

    /// Extra interpreter argument (repeatable)
    #[arg(long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(default_value = "isorun.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List environment variable overrides
    Env,
}
