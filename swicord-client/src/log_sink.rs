//! Human-readable trace lines for the surrounding UI.

use std::sync::{Arc, Mutex};

/// Append-only consumer of trace lines.
///
/// Lines arrive in the order they were produced. Implementations must not
/// block; the session appends while holding its state lock.
pub trait LogSink: Send + Sync {
    fn append(&self, line: &str);
}

/// Forwards every line to `tracing` at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&self, line: &str) {
        tracing::info!(target: "swicord::gateway", "{}", line);
    }
}

/// Keeps lines in memory, e.g. for a debug log view.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All lines joined with newlines.
    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }
}

impl LogSink for MemorySink {
    fn append(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.to_string());
    }
}
