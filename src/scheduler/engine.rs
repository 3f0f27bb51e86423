use super::{RoundObserver, RunPlan, SchedulerError, SchedulerHandle, SchedulerState, StopReason};
use crate::analysis::{Aggregator, RoundSummary};
use crate::probes::http::as_ms;
use crate::probes::{ErrorKind, Probe, ProbeResult, Target};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub rounds: u64,
    pub reason: StopReason,
}

/// Drives rounds at a fixed interval and hands each round to the aggregator.
///
/// Rounds are strictly sequential. Within a round every target is probed
/// concurrently, one in-flight request per target, and results are joined
/// before ingestion.
pub struct Scheduler {
    probe: Arc<dyn Probe>,
    state: Arc<watch::Sender<SchedulerState>>,
}

impl Scheduler {
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self { probe, state: Arc::new(state) }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle { state: self.state.clone() }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Run rounds until stopped, `max_rounds` is reached or the run
    /// duration elapses. Returns once the scheduler is `Stopped`.
    pub async fn start<O>(
        &self,
        plan: &RunPlan,
        aggregator: &Aggregator,
        observer: &mut O,
    ) -> Result<RunOutcome, SchedulerError>
    where
        O: RoundObserver + ?Sized,
    {
        plan.validate()?;

        let started = self.state.send_if_modified(|state| {
            if *state == SchedulerState::Idle {
                *state = SchedulerState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(SchedulerError::NotIdle(self.state()));
        }

        let mut state_rx = self.state.subscribe();
        let run_start = Instant::now();
        let mut round = 0u64;
        let mut reason = StopReason::Requested;

        info!(
            targets = plan.targets.len(),
            interval_ms = plan.interval.as_millis() as u64,
            timeout_ms = plan.timeout.as_millis() as u64,
            max_rounds = ?plan.max_rounds,
            "Scheduler started"
        );

        loop {
            if self.state() != SchedulerState::Running {
                break;
            }
            if plan.duration.is_some_and(|d| run_start.elapsed() >= d) {
                reason = StopReason::Deadline;
                self.stop();
                break;
            }

            let tick_start = Instant::now();
            round += 1;

            let summary = RoundSummary {
                round,
                started_at: Utc::now(),
                results: self.run_round(plan).await,
            };
            let lines = aggregator.ingest(summary);
            observer.round_completed(round, &lines, aggregator);

            debug!(round, elapsed_ms = tick_start.elapsed().as_millis() as u64, "Round complete");

            if plan.max_rounds.is_some_and(|max| round >= max) {
                reason = StopReason::MaxRounds;
                self.stop();
                break;
            }

            // Interval is measured from tick start so slow rounds don't drift.
            let mut wait = plan.interval.saturating_sub(tick_start.elapsed());
            if let Some(d) = plan.duration {
                wait = wait.min(d.saturating_sub(run_start.elapsed()));
            }

            tokio::select! {
                _ = sleep(wait) => {}
                _ = state_rx.changed() => {}
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        info!(rounds = round, %reason, "Scheduler stopped");

        Ok(RunOutcome { rounds: round, reason })
    }

    /// Probe every target concurrently. Results come back in target order
    /// whatever order the probes finish in.
    async fn run_round(&self, plan: &RunPlan) -> Vec<ProbeResult> {
        let probes = plan
            .targets
            .iter()
            .map(|target| self.probe_bounded(target, plan.timeout));
        join_all(probes).await
    }

    /// Hard per-probe timeout around the probe's own timeout handling.
    async fn probe_bounded(&self, target: &Target, limit: Duration) -> ProbeResult {
        let timestamp = Utc::now();
        let start = Instant::now();

        match timeout(limit, self.probe.probe(target, limit)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %target, timeout_ms = limit.as_millis() as u64, "Probe cancelled at timeout");
                let mut result = ProbeResult::failure(
                    target.clone(),
                    ErrorKind::Timeout,
                    as_ms(start.elapsed()),
                    None,
                );
                result.timestamp = timestamp;
                result
            }
        }
    }
}
