//! # claw-capture
//!
//! In-memory log capture for Clawbernetes tests.
//!
//! This crate provides:
//!
//! - [`LogCapture`] — A capture session with transcript assertions
//! - [`LogRecord`] — One captured log event
//! - [`LogLevel`] — Severity levels (Trace, Debug, Info, Warn, Error)
//! - [`ThrowableInfo`] — Error information rendered with a bounded stack
//! - [`Dispatcher`] — In-process log facility sinks attach to
//! - [`CaptureLayer`] — `tracing` layer feeding a dispatcher
//! - [`bridge`] — Thread-scoped `install` and process-wide `init_global`
//! - [`predicate`] — Record predicates and combinators
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use claw_capture::{bridge, Dispatcher, LogCapture, LogLevel};
//! use claw_capture::predicate::{at_log_level, message_contains, PredicateExt};
//!
//! let dispatcher = Arc::new(Dispatcher::new());
//! let _guard = bridge::install(dispatcher.clone());
//!
//! let mut capture = LogCapture::new(dispatcher, true);
//! capture.start_at(LogLevel::Info);
//!
//! tracing::info!("Hello {}!", "World");
//! tracing::warn!("My application calls log.info() twice.");
//!
//! capture.assert_logs("Hello World!\nMy application calls log.info() twice.");
//! capture.assert_logs_at(LogLevel::Warn, "My application calls log.info() twice.");
//! capture.assert_any_log(at_log_level(LogLevel::Info).and(message_contains("Hello")));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod capture;
pub mod dispatch;
pub mod error;
pub mod predicate;
pub mod traits;
pub mod types;

// Re-export main types
pub use bridge::CaptureLayer;
pub use capture::{CaptureConfig, LogCapture, DEFAULT_STACK_DEPTH};
pub use dispatch::{ConsoleSink, Dispatcher};
pub use error::{CaptureError, Result};
pub use predicate::{at_log_level, PredicateExt};
pub use traits::{LogDispatch, LogSink, SinkId};
pub use types::{LogLevel, LogRecord, LogRecordBuilder, StackFrame, ThrowableInfo};
