//! Output observer sink
//!
//! Toolchain output and pipeline status lines are delivered to a sink
//! owned by the host (a terminal, an editor output panel, a test recorder).

use std::sync::Mutex;

/// Receives toolchain output and status lines
pub trait OutputSink: Send + Sync {
    /// Deliver one line of output
    fn line(&self, line: &str);

    /// An operation is starting
    fn start(&self, message: &str) {
        self.line(&format!("[Starting] {message}"));
    }

    /// An operation finished successfully
    fn done(&self, message: &str) {
        self.line(&format!("[Done] {message}"));
    }

    /// An operation failed
    fn error(&self, message: &str) {
        self.line(&format!("[Error] {message}"));
    }

    /// A non-fatal problem
    fn warning(&self, message: &str) {
        self.line(&format!("[Warning] {message}"));
    }
}

/// Sink that prints every line to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn line(&self, line: &str) {
        println!("{line}");
    }
}

/// Sink that keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Whether any received line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl OutputSink for MemorySink {
    fn line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
