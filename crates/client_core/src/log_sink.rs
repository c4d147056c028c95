//! Append-only record of the lines streamed over the log channel.
//!
//! Nothing is filtered, deduplicated or capped: the sink grows for as long as
//! the console runs, which suits interactive tailing but not unattended use.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub received_at: DateTime<Utc>,
    pub line: String,
}

#[derive(Debug, Default)]
pub struct LogSink {
    entries: Vec<LogEntry>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, line: impl Into<String>) -> &LogEntry {
        let seq = self.entries.len() as u64;
        self.entries.push(LogEntry {
            seq,
            received_at: Utc::now(),
            line: line.into(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.line.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_arrival_order_and_duplicates() {
        let mut sink = LogSink::new();
        for line in ["start", "fetch url 1", "fetch url 1", "done"] {
            sink.append(line);
        }

        assert_eq!(
            sink.lines().collect::<Vec<_>>(),
            vec!["start", "fetch url 1", "fetch url 1", "done"]
        );
        let seqs: Vec<_> = sink.entries().iter().map(|entry| entry.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn append_returns_the_new_entry() {
        let mut sink = LogSink::new();
        assert!(sink.is_empty());
        let entry = sink.append("").clone();
        assert_eq!(entry.seq, 0);
        assert_eq!(entry.line, "");
        assert_eq!(sink.len(), 1);
    }
}
