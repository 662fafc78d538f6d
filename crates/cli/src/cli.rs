//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CRPT Dispatch - rate-limited document submission to the CRPT API
#[derive(Parser, Debug)]
#[command(
    name = "crpt-dispatch",
    author,
    version,
    about = "Rate-limited document dispatcher for the CRPT API",
    long_about = "Submits registration documents to a single HTTP endpoint without ever \n\
                  exceeding N requests per interval.\n\n\
                  Producers feed a bounded queue; one scheduler releases documents at \n\
                  interval/N spacing to a pool of N workers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CRPT_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CRPT_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate sample documents and dispatch them
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display effective rate limit and cadence settings
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "dispatch.toml",
        env = "CRPT_DISPATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// Number of sample documents to submit
    #[arg(short = 'n', long, default_value = "100", env = "CRPT_DISPATCH_DOCUMENTS")]
    pub documents: u64,

    /// Number of concurrent producer tasks
    #[arg(short, long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
    pub producers: u16,

    /// Log payloads instead of sending them over HTTP
    #[arg(long)]
    pub dry_run: bool,

    /// Override endpoint URL from configuration
    #[arg(long, env = "CRPT_ENDPOINT_URL")]
    pub endpoint: Option<String>,

    /// Override bearer token from configuration
    #[arg(long, env = "CRPT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Seed for the sample document generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CRPT_DISPATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "dispatch.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "dispatch.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
