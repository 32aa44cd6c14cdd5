//! Capture sessions and transcript assertions.
//!
//! A [`LogCapture`] attaches a buffering sink to a [`LogDispatch`], collects
//! every record delivered while it is started, and compares the rendered
//! records against expectations.
//!
//! ```rust
//! use std::sync::Arc;
//! use claw_capture::{Dispatcher, LogCapture, LogLevel};
//!
//! let dispatcher = Arc::new(Dispatcher::new());
//! let mut capture = LogCapture::new(dispatcher.clone(), true);
//! capture.start_at(LogLevel::Info);
//!
//! dispatcher.emit(LogLevel::Info, "Hello World!");
//! dispatcher.emit(LogLevel::Warn, "My application calls log.info() twice.");
//!
//! capture.assert_logs("Hello World!\nMy application calls log.info() twice.");
//! capture.assert_logs_at(LogLevel::Warn, "My application calls log.info() twice.");
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{CaptureError, Result};
use crate::traits::{LogDispatch, LogSink, SinkId};
use crate::types::{LogLevel, LogRecord};

/// Number of stack frames rendered per throwable unless configured otherwise.
pub const DEFAULT_STACK_DEPTH: usize = 4;

/// Sentinel for "no floor" in the buffer.
const NO_FLOOR: u8 = u8::MAX;

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Detach every other sink when the session starts.
    pub isolating: bool,
    /// Minimum level captured, also applied to the dispatcher on start.
    pub level: Option<LogLevel>,
    /// Stack frames rendered per throwable; 0 disables throwable rendering.
    pub stack_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            isolating: false,
            level: None,
            stack_depth: DEFAULT_STACK_DEPTH,
        }
    }
}

/// The sink half of a capture session, shared with the dispatcher.
struct CaptureBuffer {
    records: Mutex<Vec<LogRecord>>,
    floor: AtomicU8,
}

impl CaptureBuffer {
    fn new(level: Option<LogLevel>) -> Self {
        let buffer = Self {
            records: Mutex::new(Vec::new()),
            floor: AtomicU8::new(NO_FLOOR),
        };
        buffer.set_floor(level);
        buffer
    }

    fn set_floor(&self, level: Option<LogLevel>) {
        let value = level.map_or(NO_FLOOR, LogLevel::as_u8);
        self.floor.store(value, Ordering::Release);
    }

    fn accepts(&self, level: LogLevel) -> bool {
        match self.floor.load(Ordering::Acquire) {
            NO_FLOOR => true,
            floor => level.is_at_least(LogLevel::from_u8(floor)),
        }
    }
}

impl LogSink for CaptureBuffer {
    fn append(&self, record: &LogRecord) {
        if self.accepts(record.level) {
            self.records.lock().push(record.clone());
        }
    }

    fn name(&self) -> &str {
        "log-capture"
    }
}

/// An in-memory capture session attached to a [`LogDispatch`].
pub struct LogCapture {
    dispatch: Arc<dyn LogDispatch>,
    buffer: Arc<CaptureBuffer>,
    config: CaptureConfig,
    sink_id: Option<SinkId>,
}

impl std::fmt::Debug for LogCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCapture")
            .field("config", &self.config)
            .field("sink_id", &self.sink_id)
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

impl LogCapture {
    /// Creates a session with no level floor.
    #[must_use]
    pub fn new(dispatch: Arc<dyn LogDispatch>, isolating: bool) -> Self {
        Self::with_config(
            dispatch,
            CaptureConfig {
                isolating,
                ..CaptureConfig::default()
            },
        )
    }

    /// Creates a session with an initial level floor.
    #[must_use]
    pub fn with_level(dispatch: Arc<dyn LogDispatch>, isolating: bool, level: LogLevel) -> Self {
        Self::with_config(
            dispatch,
            CaptureConfig {
                isolating,
                level: Some(level),
                ..CaptureConfig::default()
            },
        )
    }

    /// Creates a session with full configuration.
    #[must_use]
    pub fn with_config(dispatch: Arc<dyn LogDispatch>, config: CaptureConfig) -> Self {
        Self {
            dispatch,
            buffer: Arc::new(CaptureBuffer::new(config.level)),
            config,
            sink_id: None,
        }
    }

    /// Creates a session on the process-wide dispatcher.
    #[must_use]
    pub fn global(isolating: bool) -> Self {
        Self::new(crate::dispatch::global(), isolating)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Attaches the session and clears the buffer.
    ///
    /// Attaching is idempotent. On first attach an isolating session detaches
    /// every other sink. If a level is configured it becomes the dispatcher's
    /// effective level. The buffer is cleared on every call.
    pub fn start(&mut self) {
        if self.sink_id.is_none() {
            if self.config.isolating {
                let detached = self.dispatch.detach_all();
                debug!(detached, "isolating log capture");
            }
            let sink: Arc<dyn LogSink> = self.buffer.clone();
            let id = self.dispatch.attach(sink);
            self.sink_id = Some(id);
            debug!(sink = %id, "log capture started");
        }

        if let Some(level) = self.config.level {
            self.dispatch.set_max_level(level);
        }
        self.buffer.set_floor(self.config.level);
        self.reset();
    }

    /// Sets the level floor, then starts.
    pub fn start_at(&mut self, level: LogLevel) {
        self.set_level(level);
        self.start();
    }

    /// Detaches the session. Captured records stay readable.
    ///
    /// Sinks detached by an isolating start are not restored.
    pub fn stop(&mut self) {
        if let Some(id) = self.sink_id.take() {
            self.dispatch.detach(id);
            debug!(sink = %id, records = self.len(), "log capture stopped");
        }
    }

    /// Returns true while the session is attached.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.sink_id.is_some()
    }

    /// Clears the buffer.
    pub fn reset(&self) {
        self.buffer.records.lock().clear();
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Sets the level floor for records captured from now on.
    ///
    /// The dispatcher's effective level is updated on the next [`start`](Self::start).
    pub fn set_level(&mut self, level: LogLevel) {
        trace!(%level, "capture level set");
        self.config.level = Some(level);
        if self.is_started() {
            self.buffer.set_floor(Some(level));
        }
    }

    /// Sets how many stack frames are rendered per throwable.
    pub fn set_stack_depth(&mut self, depth: usize) {
        self.config.stack_depth = depth;
    }

    /// Returns the configured level floor.
    #[must_use]
    pub const fn level(&self) -> Option<LogLevel> {
        self.config.level
    }

    /// Returns the configured stack depth.
    #[must_use]
    pub const fn stack_depth(&self) -> usize {
        self.config.stack_depth
    }

    /// Returns true if starting detaches other sinks.
    #[must_use]
    pub const fn is_isolating(&self) -> bool {
        self.config.isolating
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CaptureConfig {
        &self.config
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Appends a record directly, applying the level floor.
    pub fn append(&self, record: &LogRecord) {
        self.buffer.append(record);
    }

    /// Returns a snapshot of the captured records.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.buffer.records.lock().clone()
    }

    /// Returns the number of captured records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.records.lock().len()
    }

    /// Returns true if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.records.lock().is_empty()
    }

    /// Renders every captured record, joined by `\n`.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.rendered(None).join("\n")
    }

    /// Renders records at or above `level`, joined by `\n`.
    #[must_use]
    pub fn transcript_at(&self, level: LogLevel) -> String {
        self.rendered(Some(level)).join("\n")
    }

    fn rendered(&self, level: Option<LogLevel>) -> Vec<String> {
        let depth = self.config.stack_depth;
        self.records()
            .iter()
            .filter(|r| level.is_none_or(|level| r.level.is_at_least(level)))
            .map(|r| r.render(depth))
            .collect()
    }

    fn mapped<F>(&self, level: Option<LogLevel>, mapper: F) -> Vec<String>
    where
        F: Fn(&str) -> String,
    {
        self.records()
            .iter()
            .filter(|r| level.is_none_or(|level| r.level.is_at_least(level)))
            .map(|r| mapper(&r.message))
            .collect()
    }

    // =========================================================================
    // Checks
    // =========================================================================

    /// Compares the full transcript against `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Mismatch`] if they differ.
    pub fn check_logs(&self, expected: &str) -> Result<()> {
        compare(expected, &self.rendered(None))
    }

    /// Compares the transcript of records at or above `level`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Mismatch`] if they differ.
    pub fn check_logs_at(&self, level: LogLevel, expected: &str) -> Result<()> {
        compare(expected, &self.rendered(Some(level)))
    }

    /// Compares mapped messages (without throwables) against `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Mismatch`] if they differ.
    pub fn check_logs_mapped<F>(&self, mapper: F, expected: &str) -> Result<()>
    where
        F: Fn(&str) -> String,
    {
        compare(expected, &self.mapped(None, mapper))
    }

    /// Compares mapped messages of records at or above `level`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Mismatch`] if they differ.
    pub fn check_logs_at_mapped<F>(&self, level: LogLevel, mapper: F, expected: &str) -> Result<()>
    where
        F: Fn(&str) -> String,
    {
        compare(expected, &self.mapped(Some(level), mapper))
    }

    /// Checks that at least one record satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoMatch`] with the record count and the full
    /// transcript if nothing matches.
    pub fn check_any_log<P>(&self, predicate: P) -> Result<()>
    where
        P: Fn(&LogRecord) -> bool,
    {
        // Predicates run on a snapshot; one that logs must not deadlock.
        let depth = self.config.stack_depth;
        let records = self.records();
        if records.iter().any(|r| predicate(r)) {
            return Ok(());
        }

        let actual: Vec<String> = records.iter().map(|r| r.render(depth)).collect();
        Err(CaptureError::NoMatch {
            checked: records.len(),
            actual: actual.join("\n"),
        })
    }

    /// Checks that no record satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::UnexpectedMatch`] with the matching messages.
    pub fn check_no_log<P>(&self, predicate: P) -> Result<()>
    where
        P: Fn(&LogRecord) -> bool,
    {
        let matches: Vec<String> = self
            .records()
            .iter()
            .filter(|r| predicate(r))
            .map(|r| r.message.clone())
            .collect();

        if matches.is_empty() {
            Ok(())
        } else {
            Err(CaptureError::UnexpectedMatch {
                count: matches.len(),
                actual: matches.join("\n"),
            })
        }
    }

    // =========================================================================
    // Assertions
    // =========================================================================

    /// Asserts that the full transcript equals `expected`.
    ///
    /// `\r\n` in `expected` is treated as `\n`.
    ///
    /// # Panics
    ///
    /// Panics with the expected and actual transcripts if they differ.
    #[track_caller]
    pub fn assert_logs(&self, expected: &str) {
        fail_on_error(self.check_logs(expected));
    }

    /// Asserts on the transcript of records at or above `level`.
    ///
    /// # Panics
    ///
    /// Panics with the expected and actual transcripts if they differ.
    #[track_caller]
    pub fn assert_logs_at(&self, level: LogLevel, expected: &str) {
        fail_on_error(self.check_logs_at(level, expected));
    }

    /// Asserts on messages passed through `mapper`, e.g. to redact timestamps.
    ///
    /// # Panics
    ///
    /// Panics with the expected and actual transcripts if they differ.
    #[track_caller]
    pub fn assert_logs_mapped<F>(&self, mapper: F, expected: &str)
    where
        F: Fn(&str) -> String,
    {
        fail_on_error(self.check_logs_mapped(mapper, expected));
    }

    /// Asserts on mapped messages of records at or above `level`.
    ///
    /// # Panics
    ///
    /// Panics with the expected and actual transcripts if they differ.
    #[track_caller]
    pub fn assert_logs_at_mapped<F>(&self, level: LogLevel, mapper: F, expected: &str)
    where
        F: Fn(&str) -> String,
    {
        fail_on_error(self.check_logs_at_mapped(level, mapper, expected));
    }

    /// Asserts that at least one record satisfies `predicate`.
    ///
    /// # Panics
    ///
    /// Panics with the record count and transcript if nothing matches.
    #[track_caller]
    pub fn assert_any_log<P>(&self, predicate: P)
    where
        P: Fn(&LogRecord) -> bool,
    {
        fail_on_error(self.check_any_log(predicate));
    }

    /// Asserts that no record satisfies `predicate`.
    ///
    /// # Panics
    ///
    /// Panics with the matching messages if any record matches.
    #[track_caller]
    pub fn assert_no_log<P>(&self, predicate: P)
    where
        P: Fn(&LogRecord) -> bool,
    {
        fail_on_error(self.check_no_log(predicate));
    }
}

impl Drop for LogCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn compare(expected: &str, actual: &[String]) -> Result<()> {
    let expected = normalize_line_endings(expected);
    let actual = actual.join("\n");
    if expected == actual {
        Ok(())
    } else {
        Err(CaptureError::Mismatch { expected, actual })
    }
}

#[track_caller]
#[allow(clippy::panic)]
fn fail_on_error(result: Result<()>) {
    if let Err(err) = result {
        panic!("{err}");
    }
}
