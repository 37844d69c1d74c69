//! jm - background job manager
//!
//! CLI entry point for driving the job manager with simulated renewals.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use jobmanager::cli::{Cli, Command, OutputFormat, get_log_path};
use jobmanager::config::Config;
use jobmanager::jobs::{JobLogger, JobManager, QueueState, TracingLogger};
use jobmanager::simulation::{self, SimulationConfig};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jobmanager")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("jm.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs keeps the previous run's log file intact
    if !matches!(cli.command, Command::Logs { .. }) {
        setup_logging(cli.verbose).context("Failed to setup logging")?;
    }

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "jm loaded config: max-concurrent-jobs={}",
        config.jobs.max_concurrent_jobs
    );

    match cli.command {
        Command::Run {
            domains,
            max_concurrent_jobs,
            delay_ms,
            fail,
            reject,
            panic,
            repeat,
            format,
        } => {
            let mut config = config;
            if let Some(max) = max_concurrent_jobs {
                config.jobs.max_concurrent_jobs = max;
            }
            let sim = SimulationConfig {
                domains: if domains.is_empty() {
                    config.simulation.domains.clone()
                } else {
                    domains
                },
                delay_ms: delay_ms.unwrap_or(config.simulation.delay_ms),
                fail: [config.simulation.fail.clone(), fail].concat(),
                reject: [config.simulation.reject.clone(), reject].concat(),
                panic: [config.simulation.panic.clone(), panic].concat(),
                repeat: repeat.unwrap_or(config.simulation.repeat),
            };
            cmd_run(&config, &sim, format).await
        }
        Command::Config => cmd_config(&config),
        Command::Logs { follow, lines } => cmd_logs(follow, lines),
    }
}

/// Submit simulated renewals and report how the manager handled them
async fn cmd_run(config: &Config, sim: &SimulationConfig, format: OutputFormat) -> Result<()> {
    if sim.domains.is_empty() {
        return Err(eyre::eyre!("No domains to renew. Pass domains or set simulation.domains."));
    }

    let manager = JobManager::new(config.jobs.clone()).context("Failed to create job manager")?;
    let logger: Arc<dyn JobLogger> = Arc::new(TracingLogger::scoped("renewal"));

    let started = Instant::now();
    let submissions = simulation::submit_renewals(&manager, Some(logger), &sim.domains, sim);
    manager.wait_idle().await;
    let elapsed = started.elapsed();

    let state = manager.queue_state();
    info!(submissions, ?elapsed, stats = ?state.stats, "Run complete");

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "submissions": submissions,
                "elapsed_ms": elapsed.as_millis() as u64,
                "max_concurrent_jobs": manager.max_concurrent_jobs(),
                "state": state,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => print_summary(submissions, &state, elapsed.as_millis()),
    }

    Ok(())
}

fn print_summary(submissions: usize, state: &QueueState, elapsed_ms: u128) {
    let stats = &state.stats;
    println!("Renewal Run");
    println!("-----------");
    println!("Submissions:  {}", submissions);
    println!("Accepted:     {}", stats.submitted);
    println!("Deduplicated: {}", stats.deduplicated.to_string().dimmed());
    println!("Succeeded:    {}", stats.succeeded.to_string().green());
    println!("Failed:       {}", stats.failed.to_string().yellow());
    println!("Panicked:     {}", stats.panicked.to_string().red());
    println!("Peak workers: {}", stats.peak_workers);
    println!("Elapsed:      {}ms", elapsed_ms);
    if stats.failed > 0 || stats.panicked > 0 {
        println!();
        println!("Details in: {}", get_log_path().display().to_string().cyan());
    }
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

/// Show logs
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        println!("jm may not have been run yet.");
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        // Use tail -f for following
        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;

        child.wait()?;
    } else {
        // Read last N lines
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(std::result::Result::ok).collect();

        let start = all_lines.len().saturating_sub(lines);

        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}
