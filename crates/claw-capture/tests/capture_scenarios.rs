//! End-to-end capture scenarios driven through the `tracing` bridge.
//!
//! Each test owns a private dispatcher and installs the bridge as its
//! thread's default subscriber, so tests can run in parallel.

use std::io::Write;
use std::sync::Arc;

use claw_capture::predicate::{message_matches, PredicateExt};
use claw_capture::{
    at_log_level, bridge, CaptureConfig, CaptureError, ConsoleSink, Dispatcher, LogCapture,
    LogDispatch, LogLevel, LogRecord,
};
use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;

// ==================== Helper Functions ====================

struct Harness {
    dispatcher: Arc<Dispatcher>,
    capture: LogCapture,
    _guard: DefaultGuard,
}

fn harness(isolating: bool) -> Harness {
    let dispatcher = Arc::new(Dispatcher::new());
    let guard = bridge::install(Arc::clone(&dispatcher));
    let mut capture = LogCapture::new(dispatcher.clone(), isolating);
    capture.start_at(LogLevel::Info);
    Harness {
        dispatcher,
        capture,
        _guard: guard,
    }
}

fn log_greeting() {
    tracing::info!("Hello {}!", "World");
    tracing::warn!("My application calls log.info() twice.");
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ==================== Transcript Tests ====================

#[test]
fn test_assert_logs() {
    let h = harness(true);
    log_greeting();

    h.capture
        .assert_logs("Hello World!\nMy application calls log.info() twice.");
    h.capture
        .assert_logs_at(LogLevel::Warn, "My application calls log.info() twice.");
    h.capture.assert_logs_at(LogLevel::Error, "");
}

#[test]
fn test_debug_is_suppressed_by_start_level() {
    let h = harness(true);
    tracing::debug!("not interesting");
    log_greeting();

    assert_eq!(h.capture.len(), 2);
    assert_eq!(h.dispatcher.max_level(), LogLevel::Info);
}

#[test]
fn test_start_with_specified_level() {
    let mut h = harness(true);
    h.capture.stop();
    h.capture.start_at(LogLevel::Warn);

    log_greeting();

    h.capture.assert_logs("My application calls log.info() twice.");
    h.capture.assert_logs_at(LogLevel::Error, "");
}

#[test]
fn test_create_with_specified_level() {
    let dispatcher = Arc::new(Dispatcher::new());
    let _guard = bridge::install(Arc::clone(&dispatcher));
    let mut capture = LogCapture::with_level(dispatcher, true, LogLevel::Warn);
    capture.start();

    log_greeting();

    capture.assert_logs("My application calls log.info() twice.");
    capture.assert_logs_at(LogLevel::Warn, "My application calls log.info() twice.");
}

#[test]
fn test_clear_logs_between_tests() {
    let mut h = harness(true);
    tracing::info!("Has logged previously");

    h.capture.start();
    tracing::info!("Logs from another test");

    h.capture.assert_logs("Logs from another test");
}

#[test]
fn test_reset_yields_empty_transcript() {
    let h = harness(false);
    log_greeting();
    h.capture.reset();

    h.capture.assert_logs("");
    assert!(h.capture.is_empty());
}

// ==================== Predicate Tests ====================

#[test]
fn test_assert_any_log_with_predicate() {
    let h = harness(true);
    log_greeting();

    let hello = message_matches("Hello .*!").map_err(|e| e.to_string());
    assert!(hello.is_ok());
    if let Ok(hello) = hello {
        h.capture.assert_any_log(hello.clone());
        h.capture.assert_any_log(at_log_level(LogLevel::Info).and(hello));
    }

    let not_logged = message_matches("Not logged").map_err(|e| e.to_string());
    assert!(not_logged.is_ok());
    if let Ok(not_logged) = not_logged {
        let result = h
            .capture
            .check_any_log(at_log_level(LogLevel::Info).and(not_logged));
        assert_eq!(
            result.err().map(|e| e.to_string()),
            Some(
                "None of the 2 log lines matched ==> expected: <<Predicate>> but was: \
                 <Hello World!\nMy application calls log.info() twice.>"
                    .to_string()
            )
        );
    }
}

#[test]
fn test_assert_no_log_with_negative_predicate() {
    let h = harness(true);
    log_greeting();

    let hi = message_matches("Hi .*!").map_err(|e| e.to_string());
    assert!(hi.is_ok());
    if let Ok(hi) = hi {
        h.capture.assert_no_log(hi.clone());
        h.capture.assert_no_log(at_log_level(LogLevel::Info).and(hi));
    }

    let hello = message_matches("Hello .*!").map_err(|e| e.to_string());
    assert!(hello.is_ok());
    if let Ok(hello) = hello {
        let result = h
            .capture
            .check_no_log(at_log_level(LogLevel::Info).and(hello));
        assert!(matches!(
            result,
            Err(CaptureError::UnexpectedMatch { count: 1, ref actual }) if actual == "Hello World!"
        ));
        assert_eq!(
            result.err().map(|e| e.to_string()),
            Some(
                "Found 1 matching log line(s) ==> expected: <<No match for Predicate>> but was: <Hello World!>"
                    .to_string()
            )
        );
    }
}

#[test]
#[should_panic(expected = "None of the 2 log lines matched")]
fn test_assert_any_log_panics() {
    let h = harness(true);
    log_greeting();
    h.capture.assert_any_log(|r: &LogRecord| r.message.is_empty());
}

// ==================== Mapper Tests ====================

#[test]
fn test_assert_logs_with_string_mapper() {
    let h = harness(true);
    tracing::info!("The time is {}", "14:05");
    tracing::warn!("User name: {} {}", "John", "Smith");

    let time = regex::Regex::new(r"\b\d{1,2}:\d{2}\b").map_err(|e| e.to_string());
    assert!(time.is_ok());
    let Ok(time) = time else { return };
    let user = regex::Regex::new(r"User name: .*").map_err(|e| e.to_string());
    assert!(user.is_ok());
    let Ok(user) = user else { return };

    let mapper = |line: &str| {
        let line = time.replace(line, "hh:mm");
        user.replace(&line, "User name: <USER NAME>").into_owned()
    };

    h.capture
        .assert_logs_mapped(&mapper, "The time is hh:mm\nUser name: <USER NAME>");
    h.capture
        .assert_logs_at_mapped(LogLevel::Warn, &mapper, "User name: <USER NAME>");
    h.capture
        .assert_logs("The time is 14:05\nUser name: John Smith");
}

// ==================== Error Rendering Tests ====================

#[derive(Debug)]
struct QuotaExceeded {
    tenant: &'static str,
}

impl std::fmt::Display for QuotaExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tenant {} is over quota", self.tenant)
    }
}

impl std::error::Error for QuotaExceeded {}

#[test]
fn test_traced_error_renders_header() {
    let h = harness(false);
    let err = QuotaExceeded { tenant: "acme" };
    tracing::error!(error = &err as &(dyn std::error::Error + 'static), "scheduling rejected");

    h.capture
        .assert_logs("scheduling rejected\nQuotaExceeded: tenant acme is over quota");
    h.capture
        .assert_logs_mapped(|m: &str| m.to_string(), "scheduling rejected");
}

// ==================== Isolation Tests ====================

#[test]
fn test_isolation_detaches_console() {
    let dispatcher = Arc::new(Dispatcher::new());
    let _guard = bridge::install(Arc::clone(&dispatcher));
    let console_out = SharedBuf::default();
    dispatcher.attach(Arc::new(ConsoleSink::with_writer(console_out.clone())));

    tracing::info!("visible on console");

    let mut capture = LogCapture::with_config(
        dispatcher.clone(),
        CaptureConfig {
            isolating: true,
            ..CaptureConfig::default()
        },
    );
    capture.start();
    tracing::info!("captured only");
    capture.stop();
    tracing::info!("seen by nobody");

    let console = String::from_utf8_lossy(&console_out.0.lock()).to_string();
    assert!(console.contains("visible on console"));
    assert!(!console.contains("captured only"));
    assert!(!console.contains("seen by nobody"));
    capture.assert_logs("captured only");
    assert!(dispatcher.is_empty());
}

#[test]
fn test_non_isolating_capture_shares_stream() {
    let dispatcher = Arc::new(Dispatcher::new());
    let _guard = bridge::install(Arc::clone(&dispatcher));
    let console_out = SharedBuf::default();
    dispatcher.attach(Arc::new(ConsoleSink::with_writer(console_out.clone())));

    let mut capture = LogCapture::new(dispatcher.clone(), false);
    capture.start();
    tracing::warn!("both see this");

    let console = String::from_utf8_lossy(&console_out.0.lock()).to_string();
    assert!(console.contains("both see this"));
    capture.assert_logs("both see this");
}

// ==================== Concurrency Tests ====================

#[test]
fn test_records_from_workers_with_own_install() {
    let h = harness(false);

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let dispatcher = Arc::clone(&h.dispatcher);
            std::thread::spawn(move || {
                // Spawned threads do not inherit the default subscriber.
                let _guard = bridge::install(dispatcher);
                for i in 0..25 {
                    tracing::info!("worker {w} step {i}");
                }
            })
        })
        .collect();
    for worker in workers {
        assert!(worker.join().is_ok());
    }

    assert_eq!(h.capture.len(), 100);
    h.capture.assert_any_log(|r: &LogRecord| r.message == "worker 3 step 24");
    h.capture.assert_no_log(at_log_level(LogLevel::Warn));
}
