//! Record predicates for [`LogCapture::assert_any_log`] and
//! [`LogCapture::assert_no_log`].
//!
//! A predicate is any `Fn(&LogRecord) -> bool`. The helpers here cover the
//! common cases and [`PredicateExt`] composes them:
//!
//! ```rust
//! use claw_capture::predicate::{at_log_level, message_contains, PredicateExt};
//! use claw_capture::LogLevel;
//!
//! let warned_about_disk = at_log_level(LogLevel::Warn).and(message_contains("disk"));
//! ```
//!
//! [`LogCapture::assert_any_log`]: crate::LogCapture::assert_any_log
//! [`LogCapture::assert_no_log`]: crate::LogCapture::assert_no_log

use regex::Regex;

use crate::error::Result;
use crate::types::{LogLevel, LogRecord};

/// Matches records whose severity is at least `level`.
#[must_use]
pub fn at_log_level(level: LogLevel) -> impl Fn(&LogRecord) -> bool + Clone + Send + Sync {
    move |record: &LogRecord| record.level.is_at_least(level)
}

/// Matches records whose message contains `text`.
#[must_use]
pub fn message_contains(text: impl Into<String>) -> impl Fn(&LogRecord) -> bool + Clone + Send + Sync {
    let text = text.into();
    move |record: &LogRecord| record.message.contains(text.as_str())
}

/// Matches records whose entire message matches `pattern`.
///
/// The pattern is anchored at both ends, so `Hello .*!` matches
/// `Hello World!` but not `Say Hello World!`.
///
/// # Errors
///
/// Returns [`CaptureError::InvalidPattern`](crate::CaptureError::InvalidPattern)
/// if the pattern does not compile.
pub fn message_matches(
    pattern: &str,
) -> Result<impl Fn(&LogRecord) -> bool + Clone + Send + Sync + use<>> {
    let regex = Regex::new(&format!(r"\A(?:{pattern})\z"))?;
    Ok(move |record: &LogRecord| regex.is_match(&record.message))
}

/// Matches records emitted from `prefix` or one of its submodules.
#[must_use]
pub fn from_target(prefix: impl Into<String>) -> impl Fn(&LogRecord) -> bool + Clone + Send + Sync {
    let prefix = prefix.into();
    move |record: &LogRecord| {
        record.target == prefix
            || record
                .target
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with("::"))
    }
}

/// Matches records that carry error information.
#[must_use]
pub fn has_throwable() -> impl Fn(&LogRecord) -> bool + Clone + Send + Sync {
    |record: &LogRecord| record.throwable.is_some()
}

/// Logical combinators for record predicates.
pub trait PredicateExt: Fn(&LogRecord) -> bool + Sized {
    /// Matches when both predicates match.
    fn and<P>(self, other: P) -> impl Fn(&LogRecord) -> bool
    where
        P: Fn(&LogRecord) -> bool,
    {
        move |record: &LogRecord| self(record) && other(record)
    }

    /// Matches when either predicate matches.
    fn or<P>(self, other: P) -> impl Fn(&LogRecord) -> bool
    where
        P: Fn(&LogRecord) -> bool,
    {
        move |record: &LogRecord| self(record) || other(record)
    }

    /// Matches when this predicate does not.
    fn not(self) -> impl Fn(&LogRecord) -> bool {
        move |record: &LogRecord| !self(record)
    }
}

impl<F> PredicateExt for F where F: Fn(&LogRecord) -> bool {}
