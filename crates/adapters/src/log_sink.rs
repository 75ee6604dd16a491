//! Line sinks shared by the JSON logger and telemetry adapters.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Receives pre-formatted, newline-terminated lines.
pub trait LogSink: Send + Sync {
    /// Write one line.
    fn write_line(&self, line: &str);
}

/// Writes lines to stderr so stdout stays free for command output.
#[derive(Debug, Default)]
pub struct StderrLogSink;

impl LogSink for StderrLogSink {
    fn write_line(&self, line: &str) {
        let mut stderr = std::io::stderr().lock();
        if let Err(error) = stderr.write_all(line.as_bytes()) {
            tracing::warn!(%error, "log sink write failed");
        }
    }
}

/// Keeps lines in memory; used when the caller wants to inspect output.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain captured lines.
    pub fn take(&self) -> Vec<String> {
        let mut guard = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }

    /// Captured lines parsed as JSON; lines that fail to parse are skipped.
    pub fn take_json(&self) -> Vec<serde_json::Value> {
        self.take()
            .iter()
            .filter_map(|line| serde_json::from_str(line.trim()).ok())
            .collect()
    }
}

impl LogSink for MemoryLogSink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}
