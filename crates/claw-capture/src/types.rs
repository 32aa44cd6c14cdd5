//! Core types for captured log output.
//!
//! This module provides:
//! - [`LogLevel`] — Severity levels for captured records
//! - [`LogRecord`] — One captured log event
//! - [`ThrowableInfo`] — Error information attached to a record
//! - [`StackFrame`] — One frame of an error's stack

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};

/// Log severity levels, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed debugging information
    Trace = 0,
    /// Debugging information
    Debug = 1,
    /// General information
    Info = 2,
    /// Warning conditions
    Warn = 3,
    /// Error conditions
    Error = 4,
}

impl LogLevel {
    /// All levels in ascending severity.
    pub const ALL: [Self; 5] = [Self::Trace, Self::Debug, Self::Info, Self::Warn, Self::Error];

    /// Returns true if this level is at least as severe as the given level.
    #[must_use]
    pub fn is_at_least(&self, level: Self) -> bool {
        *self >= level
    }

    /// Returns the string representation of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub(crate) const fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.pad(name)
    }
}

impl FromStr for LogLevel {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(CaptureError::UnknownLevel(other.to_string())),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        Self::from(*level)
    }
}

/// A single frame of an error's stack, renderable on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Function or method the frame belongs to
    pub symbol: String,
    /// Source file, if known
    #[serde(default)]
    pub file: Option<String>,
    /// Line within `file`, if known
    #[serde(default)]
    pub line: Option<u32>,
}

impl StackFrame {
    /// Creates a frame with no location information.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
            line: None,
        }
    }

    /// Creates a frame located at `file:line`.
    #[must_use]
    pub fn at(symbol: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            symbol: symbol.into(),
            file: Some(file.into()),
            line: Some(line),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}({file}:{line})", self.symbol),
            (Some(file), None) => write!(f, "{}({file})", self.symbol),
            _ => f.write_str(&self.symbol),
        }
    }
}

/// Error information attached to a log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrowableInfo {
    /// Type name of the error
    pub class_name: String,
    /// The error's own message
    pub message: String,
    /// Stack frames, innermost first
    #[serde(default)]
    pub frames: Vec<StackFrame>,
    /// The error that caused this one
    #[serde(default)]
    pub cause: Option<Box<ThrowableInfo>>,
}

impl ThrowableInfo {
    /// Creates throwable information without frames or cause.
    #[must_use]
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Builds throwable information from a Rust error.
    ///
    /// The class name is the unqualified type name of `E`. Sources reachable
    /// through [`std::error::Error::source`] become the cause chain.
    #[must_use]
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let class_name = known_class_name(error)
            .map_or_else(|| short_type_name(std::any::type_name::<E>()), str::to_string);
        let mut info = Self::new(class_name, error.to_string());
        info.cause = error.source().map(|source| Box::new(Self::from_dyn_error(source)));
        info
    }

    /// Builds throwable information from a type-erased error.
    ///
    /// Common standard library errors and [`CaptureError`] keep their type
    /// name. Any other concrete type cannot be recovered from a trait object,
    /// so its class name is `Error`.
    #[must_use]
    pub fn from_dyn_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let class_name = known_class_name(error).unwrap_or(UNKNOWN_CLASS);
        let mut info = Self::new(class_name, error.to_string());
        info.cause = error.source().map(|source| Box::new(Self::from_dyn_error(source)));
        info
    }

    /// Appends a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Appends several stack frames.
    #[must_use]
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = StackFrame>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// Sets the cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns false when the information is too incomplete to render.
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        !self.class_name.trim().is_empty()
    }

    /// Renders the header line and at most `depth` frames.
    ///
    /// Frames beyond `depth` are dropped without a marker. Causes are not
    /// rendered. The output never ends with a newline, so a throwable without
    /// frames renders as the bare `ClassName: message` header. Transcripts
    /// written for logback-style appenders, which end that header with `\n`,
    /// need the trailing newline removed.
    #[must_use]
    pub fn render(&self, depth: usize) -> String {
        let mut out = format!("{}: {}", self.class_name, self.message);
        for frame in self.frames.iter().take(depth) {
            out.push_str("\n    ");
            out.push_str(&frame.to_string());
        }
        out
    }
}

/// Strips the module path (and generic arguments' paths) from a type name.
fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    if short.is_empty() {
        "Error".to_string()
    } else {
        short.to_string()
    }
}

/// Class name used when an error's type cannot be recovered.
const UNKNOWN_CLASS: &str = "Error";

/// Names the error types that can be recognized behind a trait object.
fn known_class_name(error: &(dyn std::error::Error + 'static)) -> Option<&'static str> {
    let name = if error.is::<std::io::Error>() {
        "io::Error"
    } else if error.is::<std::fmt::Error>() {
        "fmt::Error"
    } else if error.is::<std::num::ParseIntError>() {
        "ParseIntError"
    } else if error.is::<std::num::ParseFloatError>() {
        "ParseFloatError"
    } else if error.is::<std::num::TryFromIntError>() {
        "TryFromIntError"
    } else if error.is::<std::str::ParseBoolError>() {
        "ParseBoolError"
    } else if error.is::<std::str::Utf8Error>() {
        "Utf8Error"
    } else if error.is::<std::string::FromUtf8Error>() {
        "FromUtf8Error"
    } else if error.is::<std::net::AddrParseError>() {
        "AddrParseError"
    } else if error.is::<std::time::SystemTimeError>() {
        "SystemTimeError"
    } else if error.is::<CaptureError>() {
        "CaptureError"
    } else {
        return None;
    };
    Some(name)
}

/// One captured log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity level
    pub level: LogLevel,
    /// The fully substituted message, without trailing newline
    pub message: String,
    /// Module path or target the record was emitted from
    #[serde(default)]
    pub target: String,
    /// When the record was created
    pub timestamp: DateTime<Utc>,
    /// Attached error, if any
    #[serde(default)]
    pub throwable: Option<ThrowableInfo>,
}

impl LogRecord {
    /// Creates a record with the current time and no target or throwable.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            target: String::new(),
            timestamp: Utc::now(),
            throwable: None,
        }
    }

    /// Creates a new record builder.
    #[must_use]
    pub fn builder() -> LogRecordBuilder {
        LogRecordBuilder::default()
    }

    /// Sets the target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Attaches error information.
    #[must_use]
    pub fn with_throwable(mut self, throwable: ThrowableInfo) -> Self {
        self.throwable = Some(throwable);
        self
    }

    /// Renders the record as it appears in a transcript.
    ///
    /// With `stack_depth == 0` or without a renderable throwable this is the
    /// message alone.
    #[must_use]
    pub fn render(&self, stack_depth: usize) -> String {
        match &self.throwable {
            Some(throwable) if stack_depth > 0 && throwable.is_renderable() => {
                format!("{}\n{}", self.message, throwable.render(stack_depth))
            }
            _ => self.message.clone(),
        }
    }
}

/// Builder for constructing log records.
#[derive(Debug, Default)]
pub struct LogRecordBuilder {
    level: Option<LogLevel>,
    message: Option<String>,
    target: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    throwable: Option<ThrowableInfo>,
}

impl LogRecordBuilder {
    /// Sets the log level.
    #[must_use]
    pub const fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the target.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attaches error information.
    #[must_use]
    pub fn throwable(mut self, throwable: ThrowableInfo) -> Self {
        self.throwable = Some(throwable);
        self
    }

    /// Builds the record, returning an error if level or message is missing.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::MissingField`] if a required field is not set.
    pub fn build(self) -> Result<LogRecord> {
        let level = self.level.ok_or(CaptureError::MissingField("level"))?;
        let message = self.message.ok_or(CaptureError::MissingField("message"))?;

        Ok(LogRecord {
            level,
            message,
            target: self.target.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            throwable: self.throwable,
        })
    }
}
