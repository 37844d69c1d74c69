//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// jm - background job manager for certificate maintenance
#[derive(Parser, Debug)]
#[command(
    name = "jm",
    about = "Bounded, deduplicating background job manager",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/jobmanager/logs/jm.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit simulated certificate renewals and wait for them to finish
    Run {
        /// Domains to renew (default: simulation.domains from config)
        domains: Vec<String>,

        /// Maximum concurrent workers (overrides jobs.max-concurrent-jobs)
        #[arg(short = 'j', long)]
        max_concurrent_jobs: Option<usize>,

        /// Time each renewal takes in milliseconds
        #[arg(short, long)]
        delay_ms: Option<u64>,

        /// Domain whose renewal fails with a retryable error (repeatable)
        #[arg(long, value_name = "DOMAIN")]
        fail: Vec<String>,

        /// Domain whose renewal fails terminally (repeatable)
        #[arg(long, value_name = "DOMAIN")]
        reject: Vec<String>,

        /// Domain whose renewal panics (repeatable)
        #[arg(long, value_name = "DOMAIN")]
        panic: Vec<String>,

        /// Submit every renewal this many times
        #[arg(short, long)]
        repeat: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as YAML
    Config,

    /// Show logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Output format for run results
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Path of the log file written by `jm`
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jobmanager")
        .join("logs")
        .join("jm.log");
    debug!(?path, "get_log_path: returning path");
    path
}
