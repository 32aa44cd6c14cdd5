//! Error types for log capture and assertions.

use thiserror::Error;

/// Errors produced while building records or checking captured output.
///
/// The three assertion variants render like a test-framework equality
/// failure, so the failure text reads the same whether it comes from a
/// `check_*` result or an `assert_*` panic.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The rendered transcript differs from the expected text.
    #[error("Log assertion failed ==> expected: <{expected}> but was: <{actual}>")]
    Mismatch {
        /// Expected transcript after line-ending normalization
        expected: String,
        /// Transcript rendered from the buffer
        actual: String,
    },

    /// No captured record satisfied the predicate.
    #[error("None of the {checked} log lines matched ==> expected: <<Predicate>> but was: <{actual}>")]
    NoMatch {
        /// Number of records checked
        checked: usize,
        /// Full transcript of the buffer
        actual: String,
    },

    /// At least one captured record satisfied a predicate that should match nothing.
    #[error("Found {count} matching log line(s) ==> expected: <<No match for Predicate>> but was: <{actual}>")]
    UnexpectedMatch {
        /// Number of matching records
        count: usize,
        /// Messages of the matching records
        actual: String,
    },

    /// A required field was not provided.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A level name could not be parsed.
    #[error("unknown log level: {0}")]
    UnknownLevel(String),

    /// A message pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A process-wide `tracing` subscriber is already installed.
    #[error("global subscriber already set: {0}")]
    GlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

impl CaptureError {
    /// Returns true for the three assertion failure variants.
    #[must_use]
    pub const fn is_assertion_failure(&self) -> bool {
        matches!(
            self,
            Self::Mismatch { .. } | Self::NoMatch { .. } | Self::UnexpectedMatch { .. }
        )
    }
}

/// Result type alias for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;
