//! 诊断日志模块：面向宿主的日志汇（log sink）抽象。
//!
//! Diagnostic log sinks.
//!
//! The dispatcher writes one human-readable line per relay attempt to a [`LogSink`].
//! Sinks are fire-and-forget: they return nothing and must never fail the call that
//! is logging. Structured events additionally go to `tracing` regardless of the sink.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TracingLogSink`] | Default; forwards lines to `tracing` |
//! | [`MemoryLogSink`] | Bounded in-memory buffer (tests, CLI `--verbose`) |
//! | [`NoopLogSink`] | Discards everything |
//! | [`CompositeLogSink`] | Fans out to several sinks |

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// Destination for diagnostic lines.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Default sink: forwards to `tracing` under the `kmapi_relay::log` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "kmapi_relay::log", "{}", message);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn log(&self, _message: &str) {}
}

/// Bounded in-memory sink; oldest lines are dropped once `max_lines` is reached.
pub struct MemoryLogSink {
    lines: RwLock<VecDeque<String>>,
    max_lines: usize,
}

impl MemoryLogSink {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: RwLock::new(VecDeque::new()),
            max_lines: max_lines.max(1),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .read()
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut l) = self.lines.write() {
            l.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.lines.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, message: &str) {
        // A poisoned lock only loses diagnostics.
        if let Ok(mut lines) = self.lines.write() {
            lines.push_back(message.to_string());
            while lines.len() > self.max_lines {
                lines.pop_front();
            }
        }
    }
}

/// Composite sink for multiple destinations.
#[derive(Default)]
pub struct CompositeLogSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl CompositeLogSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl LogSink for CompositeLogSink {
    fn log(&self, message: &str) {
        for s in &self.sinks {
            s.log(message);
        }
    }
}
