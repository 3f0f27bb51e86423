use super::event_log::EventLog;
use super::stats::AggregateStats;
use super::RoundSummary;
use crate::probes::classify;
use crate::report::format_result_line;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

struct Inner {
    stats: AggregateStats,
    log: EventLog,
}

/// Folds round results into cumulative stats and the event log.
///
/// All state sits behind a single lock, so a round is applied atomically:
/// readers see either none or all of a round's results.
pub struct Aggregator {
    slow_threshold: Duration,
    inner: Mutex<Inner>,
}

impl Aggregator {
    pub fn new(slow_threshold: Duration, log_capacity: Option<usize>) -> Self {
        let log = match log_capacity {
            Some(cap) => EventLog::with_capacity_limit(cap),
            None => EventLog::new(),
        };

        Self {
            slow_threshold,
            inner: Mutex::new(Inner { stats: AggregateStats::new(Utc::now()), log }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold one round in. Returns the rendered line for each result, in
    /// target order.
    pub fn ingest(&self, round: RoundSummary) -> Vec<String> {
        debug_assert!(!round.results.is_empty(), "round {} carries no results", round.round);

        let mut inner = self.lock();
        debug_assert!(
            round.round > inner.stats.rounds,
            "round {} ingested after round {}",
            round.round,
            inner.stats.rounds
        );

        let mut lines = Vec::with_capacity(round.results.len());
        for result in &round.results {
            let label = classify(&result.outcome, self.slow_threshold);
            inner.stats.record(result, label);

            let line = format_result_line(result, label);
            inner.log.append(line.clone());
            lines.push(line);
        }

        inner.stats.rounds = round.round;
        inner.stats.last_tick_time = Some(round.started_at);
        inner.stats.log_dropped = inner.log.dropped();

        debug!(
            round = round.round,
            total = inner.stats.total,
            succeeded = inner.stats.succeeded,
            failed = inner.stats.failed,
            "Round ingested"
        );

        lines
    }

    /// Copy of the current stats, stamped with the time of the read.
    pub fn snapshot(&self) -> AggregateStats {
        let mut stats = self.lock().stats.clone();
        stats.observed_at = Utc::now();
        stats
    }

    pub fn success_rate(&self) -> f64 {
        self.lock().stats.success_rate()
    }

    pub fn event_log(&self) -> Vec<String> {
        self.lock().log.lines().to_vec()
    }

    pub fn log_contents(&self) -> String {
        self.lock().log.contents()
    }

    pub fn clear_log(&self) {
        let mut inner = self.lock();
        inner.log.clear();
        inner.stats.log_dropped = 0;
    }
}
