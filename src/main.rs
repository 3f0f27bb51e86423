use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pulsecheck::config::MonitorConfig;

#[derive(Parser)]
#[command(
    name = "pulsecheck",
    about = "Periodic HTTP endpoint health monitor with live and final reports",
    version,
    long_about = None
)]
struct Cli {
    /// TOML config file (defaults to $PULSECHECK_CONFIG, then ./pulsecheck.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll one or more targets on a fixed interval and report
    Watch {
        /// Target URLs (bare hosts get http:// prepended)
        targets: Vec<String>,

        /// Seconds between round starts
        #[arg(long)]
        interval: Option<f64>,

        /// Stop after this many rounds
        #[arg(long)]
        max_rounds: Option<u64>,

        /// Per-probe timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Flag successful responses slower than this as slow
        #[arg(long)]
        slow_threshold_ms: Option<u64>,

        /// Print running stats every N rounds
        #[arg(long)]
        report_every: Option<u64>,

        /// Keep at most this many lines in the event log
        #[arg(long)]
        log_capacity: Option<usize>,

        /// Print only the final report, as JSON
        #[arg(long)]
        json: bool,

        /// Print the full event log after the final report
        #[arg(long)]
        dump_log: bool,
    },

    /// Probe a single target once
    Probe {
        /// Target URL
        target: String,

        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = MonitorConfig::load_or_default(cli.config.as_deref())?;

    init_tracing(&loaded.config, cli.log_json);
    loaded.report();
    let mut config = loaded.config;

    match cli.command {
        Commands::Watch {
            targets,
            interval,
            max_rounds,
            timeout,
            duration,
            slow_threshold_ms,
            report_every,
            log_capacity,
            json,
            dump_log,
        } => {
            if !targets.is_empty() {
                config.monitor.targets = targets;
            }
            if let Some(v) = interval {
                config.monitor.interval_secs = v;
            }
            if max_rounds.is_some() {
                config.monitor.max_rounds = max_rounds;
            }
            if let Some(v) = timeout {
                config.monitor.timeout_secs = v;
            }
            if duration.is_some() {
                config.monitor.duration_secs = duration;
            }
            if let Some(v) = slow_threshold_ms {
                config.health.slow_threshold_ms = v;
            }
            if let Some(v) = report_every {
                config.monitor.report_every = v;
            }
            if log_capacity.is_some() {
                config.health.log_capacity = log_capacity;
            }

            tracing::info!(targets = ?config.monitor.targets, "Starting monitor");
            pulsecheck::watch(&config, pulsecheck::WatchOptions { json, dump_log }).await?;
        }
        Commands::Probe { target, timeout, json } => {
            if let Some(v) = timeout {
                config.monitor.timeout_secs = v;
            }
            pulsecheck::probe_once(&config, &target, json).await?;
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn init_tracing(config: &MonitorConfig, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if json || config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
