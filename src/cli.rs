// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `progsched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "progsched",
    version,
    about = "Run interdependent instructions with deadlines and cascading cancellation.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Progsched.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Progsched.toml")]
    pub config: String,

    /// Submit to this instruction queue instead of `[config].instruction_queue_id`.
    #[arg(long, value_name = "ID")]
    pub queue: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROGSCHED_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the plan in submission order, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,
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
