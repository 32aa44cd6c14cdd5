//! In-process log dispatch.
//!
//! This module provides:
//! - [`Dispatcher`] — Thread-safe registry of sinks with a runtime level
//! - [`ConsoleSink`] — Line-oriented sink writing to stderr or any writer
//! - [`global`] — The process-wide dispatcher

use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::traits::{LogDispatch, LogSink, SinkId};
use crate::types::{LogLevel, LogRecord, ThrowableInfo};

static GLOBAL: Lazy<Arc<Dispatcher>> = Lazy::new(|| Arc::new(Dispatcher::new()));

/// Returns the process-wide dispatcher.
#[must_use]
pub fn global() -> Arc<Dispatcher> {
    Arc::clone(&GLOBAL)
}

/// Thread-safe registry of log sinks.
pub struct Dispatcher {
    /// Attached sinks, in registration order
    sinks: RwLock<Vec<(SinkId, Arc<dyn LogSink>)>>,
    /// Next sink ID counter
    next_id: AtomicU64,
    /// Effective minimum severity
    max_level: AtomicU8,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sinks", &self.sinks())
            .field("max_level", &self.max_level())
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with no sinks that delivers every level.
    #[must_use]
    pub fn new() -> Self {
        Self::with_level(LogLevel::Trace)
    }

    /// Creates a dispatcher with the given effective level.
    #[must_use]
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            max_level: AtomicU8::new(level.as_u8()),
        }
    }

    /// Delivers a record to every attached sink.
    ///
    /// Returns false if the record was below the effective level.
    pub fn dispatch(&self, record: &LogRecord) -> bool {
        if !self.is_enabled(record.level) {
            return false;
        }

        // Snapshot so a sink may attach or detach without deadlocking.
        let sinks: Vec<Arc<dyn LogSink>> =
            self.sinks.read().iter().map(|(_, sink)| Arc::clone(sink)).collect();
        for sink in sinks {
            sink.append(record);
        }
        true
    }

    /// Creates and dispatches a record.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>) -> bool {
        if !self.is_enabled(level) {
            return false;
        }
        self.dispatch(&LogRecord::new(level, message))
    }

    /// Creates and dispatches a record carrying error information.
    pub fn emit_error(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        throwable: ThrowableInfo,
    ) -> bool {
        if !self.is_enabled(level) {
            return false;
        }
        self.dispatch(&LogRecord::new(level, message).with_throwable(throwable))
    }

    /// Returns the number of attached sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    /// Returns true if no sinks are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }
}

impl LogDispatch for Dispatcher {
    fn attach(&self, sink: Arc<dyn LogSink>) -> SinkId {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(sink = %id, name = sink.name(), "attaching log sink");
        self.sinks.write().push((id, sink));
        id
    }

    fn detach(&self, id: SinkId) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|(existing, _)| *existing != id);
        let removed = sinks.len() != before;
        drop(sinks);

        if removed {
            debug!(sink = %id, "detached log sink");
        }
        removed
    }

    fn detach_all(&self) -> usize {
        let removed = std::mem::take(&mut *self.sinks.write());
        debug!(count = removed.len(), "detached all log sinks");
        removed.len()
    }

    fn sinks(&self) -> Vec<SinkId> {
        self.sinks.read().iter().map(|(id, _)| *id).collect()
    }

    fn set_max_level(&self, level: LogLevel) {
        let previous = LogLevel::from_u8(self.max_level.swap(level.as_u8(), Ordering::AcqRel));
        trace!(%previous, %level, "effective log level changed");
    }

    fn max_level(&self) -> LogLevel {
        LogLevel::from_u8(self.max_level.load(Ordering::Acquire))
    }
}

/// Sink writing one line per record: `LEVEL target: message`.
///
/// This is the ordinary console consumer that an isolating capture detaches.
pub struct ConsoleSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl ConsoleSink {
    /// Creates a sink writing to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(std::io::stderr())
    }

    /// Creates a sink writing to the given writer.
    #[must_use]
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Formats a record the way it is written.
    #[must_use]
    pub fn format_line(record: &LogRecord) -> String {
        let mut line = if record.target.is_empty() {
            format!("{:>5} {}", record.level, record.message)
        } else {
            format!("{:>5} {}: {}", record.level, record.target, record.message)
        };
        if let Some(throwable) = record.throwable.as_ref().filter(|t| t.is_renderable()) {
            line.push_str(&format!(" ({}: {})", throwable.class_name, throwable.message));
        }
        line
    }
}

impl LogSink for ConsoleSink {
    fn append(&self, record: &LogRecord) {
        let line = Self::format_line(record);
        // Write errors are dropped; the emitting code must not observe them.
        let _ = writeln!(self.writer.lock(), "{line}");
    }

    fn name(&self) -> &str {
        "console"
    }
}
