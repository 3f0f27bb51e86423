//! pulsecheck -- periodic HTTP endpoint health monitor.
//!
//! This crate provides the probe executor, the round scheduler, result
//! aggregation and report rendering behind the `pulsecheck` binary.

pub mod analysis;
pub mod config;
pub mod probes;
pub mod report;
pub mod scheduler;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, Instrument};
use uuid::Uuid;

use analysis::Aggregator;
use config::MonitorConfig;
use probes::{classify, HttpProbe, Probe, ProbeResult, Target};
use report::{ConsoleObserver, FinalReport, Reporter};
use scheduler::{RoundObserver, Scheduler};

/// Output switches for [`watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Print only the final report, as JSON.
    pub json: bool,
    /// Print the whole event log after the final report.
    pub dump_log: bool,
}

/// Poll the configured targets until a limit is hit or Ctrl-C is pressed,
/// streaming results to stdout, then print the final report.
pub async fn watch(config: &MonitorConfig, options: WatchOptions) -> Result<FinalReport> {
    let plan = config.plan().context("invalid monitor configuration")?;
    let run_id = Uuid::new_v4();

    let probe = Arc::new(HttpProbe::new(config.probe_options())?);
    let aggregator = Aggregator::new(config.slow_threshold(), config.health.log_capacity);
    let scheduler = Scheduler::new(probe);

    let handle = scheduler.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing current round");
            handle.stop();
        }
    });

    let mut stdout = std::io::stdout();
    let mut silent = ();
    let mut console;
    let observer: &mut dyn RoundObserver = if options.json {
        &mut silent
    } else {
        write!(stdout, "{}", report::render_banner(&plan.targets, plan.interval, Utc::now()))?;
        console = ConsoleObserver::new(stdout, Reporter::new(config.monitor.report_every));
        &mut console
    };

    let outcome = scheduler
        .start(&plan, &aggregator, observer)
        .instrument(tracing::info_span!("watch", %run_id))
        .await?;
    interrupt.abort();

    let final_report = FinalReport::new(run_id, outcome.reason, aggregator.snapshot());

    let mut stdout = std::io::stdout();
    if options.json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&final_report)?)?;
    } else {
        write!(stdout, "{}", report::render_final(&final_report.stats))?;
        writeln!(stdout, "  stopped:      {}", outcome.reason)?;
    }
    if options.dump_log {
        writeln!(stdout, "\nEvent log:")?;
        write!(stdout, "{}", aggregator.log_contents())?;
    }

    Ok(final_report)
}

/// Probe one target once and print the classified result.
pub async fn probe_once(config: &MonitorConfig, target: &str, json: bool) -> Result<ProbeResult> {
    let target = Target::parse(target)?;
    let timeout = config.probe_timeout()?;
    let probe = HttpProbe::new(config.probe_options())?;

    let result = probe.probe(&target, timeout).await;
    let label = classify(&result.outcome, config.slow_threshold());

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", report::format_result_line(&result, label));
        if let probes::Outcome::Success { digest: Some(digest), .. } = &result.outcome {
            for line in &digest.preview {
                println!("    | {}", line);
            }
        }
    }

    Ok(result)
}
