//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for process-level events
//! - Provide [`TraceLogger`], which tags request log lines with the trace id
//!
//! Request lines go to an injected [`LogSink`] rather than a global so the
//! handler path carries no hidden state.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::observability::tracing::SegmentHandle;

/// Default filter directives when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "traced_gate=debug,tower_http=debug";

/// Install the global subscriber: `RUST_LOG` filter plus a fmt layer.
pub fn init_subscriber() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_DIRECTIVES.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Severity tag of a request log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Debug,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line-oriented output shared by every request.
///
/// Implementations must write each line atomically; lines from concurrent
/// requests may interleave but never tear.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes to standard output under the stdout lock.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    }
}

/// Keeps lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.to_string());
    }
}

/// Per-request logger prefixing lines with `[LEVEL] [Trace-ID: <id>]`.
pub struct TraceLogger {
    trace_id: String,
    sink: Arc<dyn LogSink>,
}

impl TraceLogger {
    pub fn new(trace_id: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            trace_id: trace_id.into(),
            sink,
        }
    }

    pub fn for_segment(segment: &SegmentHandle, sink: Arc<dyn LogSink>) -> Self {
        Self::new(segment.trace_id(), sink)
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn log(&self, level: Level, message: &str) {
        let line = format!(
            "{} {}",
            chrono::Local::now().format("%Y/%m/%d %H:%M:%S"),
            format_line(level, &self.trace_id, message)
        );
        self.sink.write_line(&line);
    }
}

/// `[LEVEL] [Trace-ID: <id>] <message>`
pub fn format_line(level: Level, trace_id: &str, message: &str) -> String {
    format!("[{}] [Trace-ID: {}] {}", level, trace_id, message)
}
