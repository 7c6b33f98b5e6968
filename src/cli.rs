// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `streamplan`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "streamplan",
    version,
    about = "Plan a streaming topology onto containers and simulate its deployment.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the topology file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Streamplan.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STREAMPLAN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Host of the buffer servers handed to simulated containers.
    #[arg(long, value_name = "HOST", default_value = "localhost")]
    pub buffer_host: String,

    /// Buffer server port of the first container; later containers count up.
    #[arg(long, value_name = "PORT", default_value_t = 9000)]
    pub base_port: u16,

    /// Print deployment groups and the number of containers needed, then
    /// exit without assigning anything.
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
