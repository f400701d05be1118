// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `stagechain`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagechain",
    version,
    about = "Run shell commands as a chain of concurrent stages.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the chain file (TOML).
    ///
    /// Default: `Stagechain.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Stagechain.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STAGECHAIN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the chain, but don't execute any commands.
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
