//! Result aggregation: cumulative counters and the event log.

pub mod aggregator;
pub mod event_log;
pub mod stats;

use crate::probes::ProbeResult;
use chrono::{DateTime, Utc};

pub use aggregator::Aggregator;
pub use event_log::EventLog;
pub use stats::{AggregateStats, LatencySummary};

/// All results of one scheduling tick, in target order.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    /// 1-based round number.
    pub round: u64,
    /// Wall-clock start of the tick.
    pub started_at: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
}
