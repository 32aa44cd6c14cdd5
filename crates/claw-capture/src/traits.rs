//! Traits describing the ambient logging facility.
//!
//! [`LogCapture`](crate::LogCapture) never touches global logging state
//! directly. It depends on a [`LogDispatch`] capability, which lets tests
//! inject a private [`Dispatcher`](crate::Dispatcher) and keeps the capture
//! logic independent of any particular logging backend.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{LogLevel, LogRecord};

/// Handle for a sink registered with a [`LogDispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SinkId(pub u64);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// A recipient of dispatched log records.
pub trait LogSink: Send + Sync {
    /// Receives one record.
    ///
    /// Implementations must not panic: a failing sink would break the code
    /// that emitted the record.
    fn append(&self, record: &LogRecord);

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "sink"
    }
}

/// A process-wide log facility that sinks can be attached to.
pub trait LogDispatch: Send + Sync {
    /// Registers a sink and returns its handle.
    fn attach(&self, sink: Arc<dyn LogSink>) -> SinkId;

    /// Unregisters a sink. Returns false if it was not attached.
    fn detach(&self, id: SinkId) -> bool;

    /// Unregisters every sink, returning how many were removed.
    fn detach_all(&self) -> usize;

    /// Handles of all attached sinks, in registration order.
    fn sinks(&self) -> Vec<SinkId>;

    /// Sets the effective minimum severity.
    fn set_max_level(&self, level: LogLevel);

    /// Returns the effective minimum severity.
    fn max_level(&self) -> LogLevel;

    /// Returns true if records at `level` are delivered to sinks.
    fn is_enabled(&self, level: LogLevel) -> bool {
        level.is_at_least(self.max_level())
    }
}

impl<F> LogSink for F
where
    F: Fn(&LogRecord) + Send + Sync,
{
    fn append(&self, record: &LogRecord) {
        self(record);
    }

    fn name(&self) -> &str {
        "closure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

    /// A simple mock facility for testing the trait defaults.
    struct MockDispatch {
        sinks: Mutex<Vec<(SinkId, Arc<dyn LogSink>)>>,
        next_id: AtomicU64,
        level: AtomicU8,
    }

    impl MockDispatch {
        fn new() -> Self {
            Self {
                sinks: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                level: AtomicU8::new(LogLevel::Trace.as_u8()),
            }
        }
    }

    impl LogDispatch for MockDispatch {
        fn attach(&self, sink: Arc<dyn LogSink>) -> SinkId {
            let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
            self.sinks.lock().push((id, sink));
            id
        }

        fn detach(&self, id: SinkId) -> bool {
            let mut sinks = self.sinks.lock();
            let before = sinks.len();
            sinks.retain(|(existing, _)| *existing != id);
            sinks.len() != before
        }

        fn detach_all(&self) -> usize {
            let mut sinks = self.sinks.lock();
            let count = sinks.len();
            sinks.clear();
            count
        }

        fn sinks(&self) -> Vec<SinkId> {
            self.sinks.lock().iter().map(|(id, _)| *id).collect()
        }

        fn set_max_level(&self, level: LogLevel) {
            self.level.store(level.as_u8(), Ordering::Relaxed);
        }

        fn max_level(&self) -> LogLevel {
            LogLevel::from_u8(self.level.load(Ordering::Relaxed))
        }
    }

    #[test]
    fn is_enabled_follows_max_level() {
        let dispatch = MockDispatch::new();
        assert!(dispatch.is_enabled(LogLevel::Trace));

        dispatch.set_max_level(LogLevel::Warn);
        assert!(!dispatch.is_enabled(LogLevel::Info));
        assert!(dispatch.is_enabled(LogLevel::Warn));
        assert!(dispatch.is_enabled(LogLevel::Error));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = move |record: &LogRecord| seen_clone.lock().push(record.message.clone());

        sink.append(&LogRecord::new(LogLevel::Info, "one"));
        assert_eq!(LogSink::name(&sink), "closure");
        assert_eq!(seen.lock().as_slice(), ["one".to_string()]);
    }

    #[test]
    fn attach_and_detach_through_trait_object() {
        let dispatch: Arc<dyn LogDispatch> = Arc::new(MockDispatch::new());
        let a = dispatch.attach(Arc::new(|_: &LogRecord| {}));
        let b = dispatch.attach(Arc::new(|_: &LogRecord| {}));

        assert_eq!(dispatch.sinks(), vec![a, b]);
        assert!(dispatch.detach(a));
        assert!(!dispatch.detach(a));
        assert_eq!(dispatch.detach_all(), 1);
        assert!(dispatch.sinks().is_empty());
    }

    #[test]
    fn sink_id_display() {
        assert_eq!(SinkId(7).to_string(), "sink-7");
    }
}
