//! Destinations for the forwarder's operational messages.
//!
//! [`FluentLogger`](crate::FluentLogger) never panics or returns network
//! errors to its callers. Instead it writes a one-line message to a
//! [`DiagnosticSink`] supplied at construction time.

use std::io::{self, Write};

/// Receives operational messages emitted by the forwarder.
pub trait DiagnosticSink: Send + Sync {
    /// Record a single diagnostic line.
    fn write(&self, message: &str);
}

/// Closures can be used directly as sinks.
impl<F> DiagnosticSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write(&self, message: &str) {
        self(message)
    }
}

/// Default sink writing each message as a line on standard error.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn write(&self, message: &str) {
        let mut stderr = io::stderr().lock();
        // Nothing sensible can be done if stderr itself is gone.
        let _ = writeln!(stderr, "{message}");
    }
}

/// Sink forwarding messages to the `log` facade at error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn write(&self, message: &str) {
        log::error!("{message}");
    }
}
