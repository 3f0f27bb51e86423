//! Scheduler + aggregator scenarios run against scripted probes on a paused clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulsecheck::analysis::Aggregator;
use pulsecheck::probes::{ErrorKind, Probe, ProbeResult, Target};
use pulsecheck::scheduler::{RoundObserver, RunPlan, Scheduler, SchedulerState, StopReason};
use tokio::time::Instant;

#[derive(Clone, Copy)]
enum Reply {
    Status(u16),
    Refused,
}

/// Answers each target with a fixed reply after a fixed delay and records
/// when each probe started and finished.
struct ScriptedProbe {
    script: HashMap<String, (Reply, Duration)>,
    started: Mutex<Vec<(String, Instant)>>,
    finished: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    fn new(script: &[(&str, Reply, u64)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(t, reply, ms)| (t.to_string(), (*reply, Duration::from_millis(*ms))))
                .collect(),
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    fn start_times(&self, target: &str) -> Vec<Instant> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, at)| *at)
            .collect()
    }

    fn calls(&self) -> usize {
        self.started.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, target: &Target, _timeout: Duration) -> ProbeResult {
        self.started
            .lock()
            .unwrap()
            .push((target.as_str().to_string(), Instant::now()));

        let (reply, delay) = self.script[target.as_str()];
        tokio::time::sleep(delay).await;
        self.finished.lock().unwrap().push(target.as_str().to_string());

        let latency_ms = delay.as_secs_f64() * 1000.0;
        match reply {
            Reply::Status(code) => ProbeResult::from_status(target.clone(), code, latency_ms, 128),
            Reply::Refused => ProbeResult::failure(target.clone(), ErrorKind::Connect, latency_ms, None),
        }
    }
}

/// Checks the counter invariant after every round.
#[derive(Default)]
struct InvariantObserver {
    rounds_seen: Vec<u64>,
}

impl RoundObserver for InvariantObserver {
    fn round_completed(&mut self, round: u64, lines: &[String], aggregator: &Aggregator) {
        let stats = aggregator.snapshot();
        assert_eq!(stats.total, stats.succeeded + stats.failed);
        assert_eq!(stats.rounds, round);
        assert!(!lines.is_empty());
        self.rounds_seen.push(round);
    }
}

fn targets(names: &[&str]) -> Vec<Target> {
    names.iter().map(|n| Target::new_unchecked(*n)).collect()
}

fn abs_diff(a: Duration, b: Duration) -> Duration {
    if a > b { a - b } else { b - a }
}

fn aggregator() -> Aggregator {
    Aggregator::new(Duration::from_millis(1000), None)
}

#[tokio::test(start_paused = true)]
async fn test_mixed_round_counts_and_server_error_marker() {
    let probe = Arc::new(ScriptedProbe::new(&[
        ("A", Reply::Status(200), 50),
        ("B", Reply::Status(500), 10),
    ]));
    let scheduler = Scheduler::new(probe);
    let aggregator = aggregator();
    let plan = RunPlan::new(targets(&["A", "B"]), Duration::from_secs(2)).with_max_rounds(1);

    scheduler.start(&plan, &aggregator, &mut ()).await.unwrap();

    let stats = aggregator.snapshot();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(aggregator.success_rate(), 0.5);

    let log = aggregator.event_log();
    assert_eq!(log.len(), 2);
    assert!(!log[0].contains("server error"));
    assert!(log[1].contains("server error"));
}

#[tokio::test(start_paused = true)]
async fn test_log_order_follows_targets_not_completion() {
    let probe = Arc::new(ScriptedProbe::new(&[
        ("A", Reply::Status(200), 300),
        ("B", Reply::Status(200), 10),
    ]));
    let scheduler = Scheduler::new(probe.clone());
    let aggregator = aggregator();
    let plan = RunPlan::new(targets(&["A", "B"]), Duration::from_secs(1)).with_max_rounds(1);

    scheduler.start(&plan, &aggregator, &mut ()).await.unwrap();

    // B finished first...
    assert_eq!(*probe.finished.lock().unwrap(), vec!["B".to_string(), "A".to_string()]);

    // ...but A's line comes first.
    let log = aggregator.event_log();
    assert!(log[0].contains(" A "));
    assert!(log[1].contains(" B "));
}

#[tokio::test(start_paused = true)]
async fn test_probes_within_round_run_concurrently() {
    let probe = Arc::new(ScriptedProbe::new(&[
        ("A", Reply::Status(200), 400),
        ("B", Reply::Status(200), 400),
        ("C", Reply::Status(200), 400),
    ]));
    let scheduler = Scheduler::new(probe.clone());
    let aggregator = aggregator();
    let plan = RunPlan::new(targets(&["A", "B", "C"]), Duration::from_secs(1)).with_max_rounds(1);

    let begin = Instant::now();
    scheduler.start(&plan, &aggregator, &mut ()).await.unwrap();

    // Sequential execution would take 1.2s.
    assert!(begin.elapsed() < Duration::from_millis(500));
    let a = probe.start_times("A")[0];
    assert_eq!(probe.start_times("C")[0], a);
}

#[tokio::test(start_paused = true)]
async fn test_max_rounds_stops_after_exactly_three() {
    let probe = Arc::new(ScriptedProbe::new(&[("A", Reply::Status(200), 5)]));
    let scheduler = Scheduler::new(probe.clone());
    let aggregator = aggregator();
    let mut observer = InvariantObserver::default();
    let plan = RunPlan::new(targets(&["A"]), Duration::from_secs(1)).with_max_rounds(3);

    let outcome = scheduler.start(&plan, &aggregator, &mut observer).await.unwrap();

    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.reason, StopReason::MaxRounds);
    assert_eq!(observer.rounds_seen, vec![1, 2, 3]);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(probe.calls(), 3);
    assert_eq!(aggregator.snapshot().rounds, 3);
}

#[tokio::test(start_paused = true)]
async fn test_interval_measured_from_tick_start() {
    let probe = Arc::new(ScriptedProbe::new(&[("A", Reply::Status(200), 500)]));
    let scheduler = Scheduler::new(probe.clone());
    let aggregator = aggregator();
    let plan = RunPlan::new(targets(&["A"]), Duration::from_secs(2)).with_max_rounds(10);

    scheduler.start(&plan, &aggregator, &mut ()).await.unwrap();

    let ticks = probe.start_times("A");
    assert_eq!(ticks.len(), 10);
    for pair in ticks.windows(2) {
        let period = pair[1] - pair[0];
        let drift = abs_diff(period, Duration::from_secs(2));
        assert!(drift <= Duration::from_millis(5), "period {:?}", period);
    }
    let total = *ticks.last().unwrap() - ticks[0];
    assert!(abs_diff(total, Duration::from_secs(18)) <= Duration::from_millis(5));
}

#[tokio::test(start_paused = true)]
async fn test_slow_round_starts_next_tick_immediately() {
    let probe = Arc::new(ScriptedProbe::new(&[("A", Reply::Status(200), 1500)]));
    let scheduler = Scheduler::new(probe.clone());
    let aggregator = aggregator();
    let plan = RunPlan::new(targets(&["A"]), Duration::from_secs(1)).with_max_rounds(3);

    scheduler.start(&plan, &aggregator, &mut ()).await.unwrap();

    let ticks = probe.start_times("A");
    for pair in ticks.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_millis(1500));
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_round_finishes_that_round_only() {
    let probe = Arc::new(ScriptedProbe::new(&[("A", Reply::Status(200), 500)]));
    let scheduler = Scheduler::new(probe.clone());
    let aggregator = aggregator();
    let plan = RunPlan::new(targets(&["A"]), Duration::from_secs(1));

    // Round 3 runs from 2.0s to 2.5s; stop lands in the middle of it.
    let handle = scheduler.handle();
    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2250)).await;
        handle.stop();
        handle.state()
    });

    let outcome = scheduler.start(&plan, &aggregator, &mut ()).await.unwrap();

    assert_eq!(stopper.await.unwrap(), SchedulerState::Stopping);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.reason, StopReason::Requested);
    assert_eq!(aggregator.snapshot().rounds, 3);
    assert_eq!(aggregator.snapshot().total, 3);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(probe.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_sleep_ends_without_waiting() {
    let probe = Arc::new(ScriptedProbe::new(&[("A", Reply::Status(200), 10)]));
    let scheduler = Scheduler::new(probe);
    let aggregator = aggregator();
    let plan = RunPlan::new(targets(&["A"]), Duration::from_secs(60));

    let handle = scheduler.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop();
    });

    let begin = Instant::now();
    let outcome = scheduler.start(&plan, &aggregator, &mut ()).await.unwrap();

    assert_eq!(outcome.rounds, 1);
    assert!(begin.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_failing_target_polled_on_same_schedule() {
    let probe = Arc::new(ScriptedProbe::new(&[
        ("up", Reply::Status(200), 20),
        ("down", Reply::Refused, 5),
    ]));
    let scheduler = Scheduler::new(probe.clone());
    let aggregator = aggregator();
    let mut observer = InvariantObserver::default();
    let plan = RunPlan::new(targets(&["up", "down"]), Duration::from_secs(1)).with_max_rounds(4);

    scheduler.start(&plan, &aggregator, &mut observer).await.unwrap();

    let up = probe.start_times("up");
    let down = probe.start_times("down");
    assert_eq!(up, down);
    assert_eq!(up.len(), 4);

    let stats = aggregator.snapshot();
    assert_eq!(stats.total, 8);
    assert_eq!(stats.succeeded, 4);
    assert_eq!(stats.failed, 4);
}

#[test]
fn test_success_rate_is_zero_before_any_probe() {
    let aggregator = aggregator();
    assert_eq!(aggregator.success_rate(), 0.0);
    assert_eq!(aggregator.snapshot().success_rate(), 0.0);
}
