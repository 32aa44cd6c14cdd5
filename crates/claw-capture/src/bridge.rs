//! Bridge from `tracing` events to a [`Dispatcher`].
//!
//! Code under test logs with the ordinary `tracing` macros. [`CaptureLayer`]
//! turns each event into a [`LogRecord`] and hands it to a dispatcher, where
//! attached sinks (including a [`LogCapture`](crate::LogCapture)) receive it.
//!
//! There are two ways to install it:
//!
//! - [`install`] scopes a subscriber to the calling thread. Events from
//!   threads the code under test spawns are not seen.
//! - [`init_global`] installs a process-wide subscriber feeding
//!   [`dispatch::global`](crate::dispatch::global). It sees every thread, but
//!   can be called once per process.
//!
//! An error recorded on an event (`error = &err as &dyn Error`) becomes the
//! record's throwable with its class name and message. `tracing` carries no
//! stack, so bridged throwables have no frames and the stack depth only
//! affects records built with frames, e.g. through
//! [`Dispatcher::emit_error`].

use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::subscriber::{DefaultGuard, Interest};
use tracing::{debug, Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::traits::LogDispatch;
use crate::types::{LogLevel, LogRecord, ThrowableInfo};

/// Target prefix of this crate's own diagnostics, which are never forwarded.
const OWN_TARGET: &str = "claw_capture";

/// Layer forwarding `tracing` events to a dispatcher.
#[derive(Debug, Clone)]
pub struct CaptureLayer {
    dispatcher: Arc<Dispatcher>,
}

impl CaptureLayer {
    /// Creates a layer feeding the given dispatcher.
    #[must_use]
    pub const fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Creates a layer feeding the process-wide dispatcher.
    #[must_use]
    pub fn global() -> Self {
        Self::new(crate::dispatch::global())
    }

    /// Returns the dispatcher this layer feeds.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn accepts(&self, metadata: &Metadata<'_>) -> bool {
        !is_own_target(metadata.target())
            && self.dispatcher.is_enabled(LogLevel::from(metadata.level()))
    }
}

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // The effective level changes at runtime, so nothing may be cached.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.accepts(metadata)
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.accepts(metadata) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(LogLevel::from(metadata.level()), visitor.message)
            .with_target(metadata.target());
        record.throwable = visitor.throwable;
        self.dispatcher.dispatch(&record);
    }
}

/// Collects the formatted message and the first recorded error of an event.
#[derive(Default)]
struct RecordVisitor {
    message: String,
    throwable: Option<ThrowableInfo>,
}

impl Visit for RecordVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.throwable.is_none() {
            self.throwable = Some(ThrowableInfo::from_dyn_error(value));
        }
    }
}

/// Installs a subscriber feeding `dispatcher` as the current thread's default.
///
/// Only events emitted on the calling thread are forwarded, until the
/// returned guard is dropped. Threads spawned afterwards do not inherit the
/// subscriber; use [`init_global`] when the code under test logs from its
/// own threads.
#[must_use = "dropping the guard uninstalls the subscriber"]
pub fn install(dispatcher: Arc<Dispatcher>) -> DefaultGuard {
    let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(dispatcher));
    tracing::subscriber::set_default(subscriber)
}

/// Installs a process-wide subscriber feeding the global dispatcher.
///
/// Events from every thread without a thread-scoped default reach
/// [`dispatch::global`](crate::dispatch::global), where
/// [`LogCapture::global`](crate::LogCapture::global) sessions collect them.
///
/// # Errors
///
/// Returns [`CaptureError::GlobalSubscriber`] if a global subscriber is
/// already set, including by an earlier call.
pub fn init_global() -> Result<()> {
    let subscriber = tracing_subscriber::registry().with(CaptureLayer::global());
    tracing::subscriber::set_global_default(subscriber)?;
    debug!("global capture subscriber installed");
    Ok(())
}
