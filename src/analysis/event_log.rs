//! Append-only log of rendered result lines.

/// Ordered, append-only sequence of lines.
///
/// Entries are never reordered or removed except by [`EventLog::clear`].
/// With a capacity set, appends past the limit are rejected and counted.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<String>,
    capacity: Option<usize>,
    dropped: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.min(1024)),
            capacity: Some(capacity),
            dropped: 0,
        }
    }

    /// Append a line. Returns `false` when the log is full and the line was dropped.
    pub fn append(&mut self, line: impl Into<String>) -> bool {
        if self.capacity.is_some_and(|cap| self.entries.len() >= cap) {
            self.dropped += 1;
            return false;
        }
        self.entries.push(line.into());
        true
    }

    /// Lines rejected because the log was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn lines(&self) -> &[String] {
        &self.entries
    }

    /// Full log as one newline-terminated string.
    pub fn contents(&self) -> String {
        let mut out = String::with_capacity(self.entries.iter().map(|l| l.len() + 1).sum());
        for line in &self.entries {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Drop every entry and reset the dropped counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}
