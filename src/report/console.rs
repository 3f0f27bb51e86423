use super::{render_incremental, Reporter};
use crate::analysis::Aggregator;
use crate::scheduler::RoundObserver;
use std::io::Write;
use tracing::warn;

/// Writes each round's lines, plus a stats snapshot every K rounds.
pub struct ConsoleObserver<W> {
    out: W,
    reporter: Reporter,
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W, reporter: Reporter) -> Self {
        Self { out, reporter }
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!(error = %e, "Failed to write report output");
        }
    }
}

impl<W: Write + Send> RoundObserver for ConsoleObserver<W> {
    fn round_completed(&mut self, round: u64, lines: &[String], aggregator: &Aggregator) {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        if self.reporter.is_due(round) {
            text.push_str(&render_incremental(&aggregator.snapshot()));
        }
        self.emit(&text);
    }
}
