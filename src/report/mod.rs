//! Human-readable rendering of results and stats.
//!
//! Everything here is a pure function of its inputs.

pub mod console;

use crate::analysis::AggregateStats;
use crate::probes::{HealthLabel, Outcome, ProbeResult, Target};
use crate::scheduler::StopReason;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

pub use console::ConsoleObserver;

const HEAVY_RULE: usize = 60;
const LIGHT_RULE: usize = 40;

/// Decides when incremental reports are due.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    report_every: u64,
}

impl Reporter {
    /// Snapshot after every `report_every` completed rounds. Config
    /// validation guarantees at least 1.
    pub fn new(report_every: u64) -> Self {
        Self { report_every }
    }

    pub fn is_due(&self, rounds_completed: u64) -> bool {
        self.report_every > 0 && rounds_completed > 0 && rounds_completed % self.report_every == 0
    }
}

/// One line per probe result: time, target, outcome, latency, size, label.
pub fn format_result_line(result: &ProbeResult, label: HealthLabel) -> String {
    let time = result.timestamp.with_timezone(&Local).format("%H:%M:%S");

    let mut line = match &result.outcome {
        Outcome::Success { status_code, latency_ms, body_size, digest } => {
            let mut line = format!(
                "✅ [{}] {} - status {} - {:.2}ms - {} bytes",
                time, result.target, status_code, latency_ms, body_size
            );
            if let Some(digest) = digest.as_ref().filter(|d| !d.keywords.is_empty()) {
                line.push_str(&format!(" - keywords: {}", digest.keywords.join(", ")));
            }
            line
        }
        Outcome::Failure { error_kind, latency_ms, message } => {
            let mut line = format!("❌ [{}] {} - error: {}", time, result.target, error_kind);
            if let Some(message) = message {
                line.push_str(&format!(" ({})", message));
            }
            line.push_str(&format!(" - {:.2}ms", latency_ms));
            line
        }
    };

    if let Some(marker) = label.marker() {
        line.push_str(&format!(" [{}]", marker));
    }
    line
}

/// Header printed once when monitoring starts.
pub fn render_banner(targets: &[Target], interval: Duration, started: DateTime<Utc>) -> String {
    let names: Vec<&str> = targets.iter().map(Target::as_str).collect();
    format!(
        "Endpoint monitor\n\
         Started:  {}\n\
         Targets:  {}\n\
         Interval: every {}\n\
         {}\n",
        started.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        names.join(", "),
        format_std_duration(interval),
        "=".repeat(HEAVY_RULE),
    )
}

/// Short running snapshot: counts, success rate, uptime.
pub fn render_incremental(stats: &AggregateStats) -> String {
    format!(
        "\nLive stats after {} round{}:\n\
         \x20 total probes: {}\n\
         \x20 succeeded:    {}\n\
         \x20 failed:       {}\n\
         \x20 success rate: {:.2}%\n\
         \x20 uptime:       {}\n\
         {}\n",
        stats.rounds,
        if stats.rounds == 1 { "" } else { "s" },
        stats.total,
        stats.succeeded,
        stats.failed,
        stats.success_rate() * 100.0,
        format_elapsed(stats.uptime()),
        "-".repeat(LIGHT_RULE),
    )
}

/// Closing report: totals, success rate, elapsed wall time, end timestamp.
pub fn render_final(stats: &AggregateStats) -> String {
    let mut out = format!(
        "\n{}\n\
         Final report\n\
         \x20 elapsed:      {}\n\
         \x20 rounds:       {}\n\
         \x20 total probes: {}\n\
         \x20 succeeded:    {}\n\
         \x20 failed:       {}\n\
         \x20 success rate: {:.2}%\n",
        "=".repeat(HEAVY_RULE),
        format_elapsed(stats.uptime()),
        stats.rounds,
        stats.total,
        stats.succeeded,
        stats.failed,
        stats.success_rate() * 100.0,
    );

    if let (Some(min), Some(mean), Some(max)) =
        (stats.latency.min_ms, stats.latency.mean_ms(), stats.latency.max_ms)
    {
        out.push_str(&format!(
            "  latency:      min {:.2}ms / mean {:.2}ms / max {:.2}ms\n",
            min, mean, max
        ));
    }
    if stats.slow + stats.client_errors + stats.server_errors > 0 {
        out.push_str(&format!(
            "  flagged:      {} slow, {} client error, {} server error\n",
            stats.slow, stats.client_errors, stats.server_errors
        ));
    }
    if stats.log_dropped > 0 {
        out.push_str(&format!("  log dropped:  {} lines (log full)\n", stats.log_dropped));
    }

    out.push_str(&format!(
        "  ended:        {}\n",
        stats.observed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    ));
    out
}

/// Machine-readable final report for `--json`.
#[derive(Debug, Serialize)]
pub struct FinalReport {
    pub run_id: Uuid,
    pub stop_reason: StopReason,
    pub success_rate_pct: f64,
    pub elapsed_secs: f64,
    pub ended_at: DateTime<Utc>,
    pub stats: AggregateStats,
}

impl FinalReport {
    pub fn new(run_id: Uuid, stop_reason: StopReason, stats: AggregateStats) -> Self {
        Self {
            run_id,
            stop_reason,
            success_rate_pct: stats.success_rate() * 100.0,
            elapsed_secs: stats.uptime().num_milliseconds() as f64 / 1000.0,
            ended_at: stats.observed_at,
            stats,
        }
    }
}

fn format_std_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}

/// `42.3s`, `5m 07s`, `1h 02m 03s`.
pub fn format_elapsed(d: chrono::Duration) -> String {
    let millis = d.num_milliseconds().max(0);
    let secs = millis / 1000;
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", millis as f64 / 1000.0)
    }
}
