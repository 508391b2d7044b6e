// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `wavebuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wavebuild",
    version,
    about = "Run build tasks in dependency waves, skipping what is up to date.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Relative paths in it resolve against
    /// the file's directory.
    #[arg(long, global = true, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WAVEBUILD_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run tasks (default: `[config].default_task`) and their dependencies.
    Run(RunArgs),
    /// List every task with its dependencies and inputs.
    List,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Tasks to run.
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// After the first run, keep watching inputs and re-run impacted tasks.
    #[arg(long, short)]
    pub watch: bool,

    /// Maximum number of tasks running at once (overrides `[config].jobs`).
    #[arg(long, short, value_name = "N")]
    pub jobs: Option<usize>,

    /// Validate the graph and print the waves, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore stored fingerprints; run every task.
    #[arg(long, short)]
    pub force: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
