//! Round scheduling: fixed-interval ticks, concurrent fan-out, cooperative stop.

pub mod engine;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::analysis::Aggregator;
use crate::config::ConfigError;
use crate::probes::Target;

pub use engine::Scheduler;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("scheduler can only start from idle, current state is {0}")]
    NotIdle(SchedulerState),
}

/// Lifecycle: `Idle → Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Stopping => write!(f, "stopping"),
            SchedulerState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured round cap was reached.
    MaxRounds,
    /// The configured run duration elapsed.
    Deadline,
    /// `stop()` was called.
    Requested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxRounds => write!(f, "max rounds reached"),
            StopReason::Deadline => write!(f, "duration elapsed"),
            StopReason::Requested => write!(f, "stop requested"),
        }
    }
}

/// What to poll and how often. Immutable once the scheduler starts.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub targets: Vec<Target>,
    pub interval: Duration,
    pub timeout: Duration,
    pub max_rounds: Option<u64>,
    pub duration: Option<Duration>,
}

impl RunPlan {
    pub fn new(targets: Vec<Target>, interval: Duration) -> Self {
        Self {
            targets,
            interval,
            timeout: DEFAULT_TIMEOUT,
            max_rounds: None,
            duration: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::EmptyTargets);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidSeconds { field: "interval", value: 0.0 });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidSeconds { field: "timeout", value: 0.0 });
        }
        if self.max_rounds == Some(0) {
            return Err(ConfigError::ZeroMaxRounds);
        }
        if self.duration.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::InvalidSeconds { field: "duration", value: 0.0 });
        }
        Ok(())
    }
}

/// Called by the scheduler after each round has been ingested.
pub trait RoundObserver: Send {
    /// `lines` are the rendered results of this round, in target order.
    fn round_completed(&mut self, round: u64, lines: &[String], aggregator: &Aggregator);
}

impl RoundObserver for () {
    fn round_completed(&mut self, _round: u64, _lines: &[String], _aggregator: &Aggregator) {}
}

/// Cloneable control handle for a [`Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    state: Arc<watch::Sender<SchedulerState>>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Request a cooperative stop. The in-flight round finishes and is
    /// ingested; no further round starts. Stopping an idle scheduler moves it
    /// straight to `Stopped`.
    pub fn stop(&self) {
        self.state.send_if_modified(|state| match *state {
            SchedulerState::Running => {
                *state = SchedulerState::Stopping;
                true
            }
            SchedulerState::Idle => {
                *state = SchedulerState::Stopped;
                true
            }
            SchedulerState::Stopping | SchedulerState::Stopped => false,
        });
    }
}
