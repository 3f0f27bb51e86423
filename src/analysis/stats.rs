use crate::probes::{HealthLabel, ProbeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Min/max/mean latency over successful probes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub sum_ms: f64,
}

impl LatencySummary {
    pub fn record(&mut self, latency_ms: f64) {
        self.count += 1;
        self.sum_ms += latency_ms;
        self.min_ms = Some(self.min_ms.map_or(latency_ms, |m| m.min(latency_ms)));
        self.max_ms = Some(self.max_ms.map_or(latency_ms, |m| m.max(latency_ms)));
    }

    pub fn mean_ms(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum_ms / self.count as f64)
    }
}

/// Cumulative monitor counters. Counts only ever increase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rounds: u64,
    pub slow: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub latency: LatencySummary,
    pub start_time: DateTime<Utc>,
    pub last_tick_time: Option<DateTime<Utc>>,
    /// Event log lines rejected because the log was full.
    pub log_dropped: u64,
    /// When this snapshot was taken.
    pub observed_at: DateTime<Utc>,
}

impl AggregateStats {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            rounds: 0,
            slow: 0,
            client_errors: 0,
            server_errors: 0,
            latency: LatencySummary::default(),
            start_time,
            last_tick_time: None,
            log_dropped: 0,
            observed_at: start_time,
        }
    }

    pub(crate) fn record(&mut self, result: &ProbeResult, label: HealthLabel) {
        self.total += 1;
        if result.is_success() {
            self.succeeded += 1;
            self.latency.record(result.outcome.latency_ms());
        } else {
            self.failed += 1;
        }

        match label {
            HealthLabel::Slow => self.slow += 1,
            HealthLabel::ClientError => self.client_errors += 1,
            HealthLabel::ServerError => self.server_errors += 1,
            HealthLabel::Healthy | HealthLabel::Unreachable => {}
        }
    }

    /// `succeeded / total`, or exactly `0.0` before any probe has been recorded.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }

    /// Time between monitor start and this snapshot, never negative.
    pub fn uptime(&self) -> chrono::Duration {
        (self.observed_at - self.start_time).max(chrono::Duration::zero())
    }
}
