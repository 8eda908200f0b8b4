//! Diagnostics routed through the `log` facade.

use std::sync::Arc;

use fluent_logger::{FluentLogger, LogSink, record, test_utils::unused_port};
use logtest::Logger;

#[test]
fn log_sink_reports_connect_failures_at_error_level() {
    let mut captured = Logger::start();
    let logger = FluentLogger::builder("logger-test")
        .with_host("127.0.0.1".into())
        .with_port(unused_port())
        .with_sink(Arc::new(LogSink))
        .build()
        .expect("build logger");

    assert_eq!(logger.post("tag", record! { "a" => "b" }), Ok(false));

    let mut found = false;
    while let Some(entry) = captured.pop() {
        if entry.level() == log::Level::Error && entry.args().contains("Failed to connect") {
            found = true;
        }
    }
    assert!(found, "expected an error-level connect failure");
}
