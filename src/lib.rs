//! Synchronous MessagePack event forwarder for fluentd-style collectors.
//!
//! ```no_run
//! use fluent_logger::{FluentLogger, record};
//!
//! let logger = FluentLogger::new("app", "localhost", 24224)?;
//! logger.post("access", record! { "path" => "/", "status" => 200 })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod diagnostic;
pub mod forward;
pub mod value;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use diagnostic::{DiagnosticSink, LogSink, StderrSink};
pub use forward::{
    Append, Backlog, ConfigError, Connection, ConnectionError, ConnectionState, EncodeError,
    Endpoint, Event, FluentLogger, FluentLoggerBuilder, LoggerConfig, LoggerState, PostError,
    ReconnectThrottle, encode_batch, encode_event,
};
pub use value::{Opaque, Record, RecordValue, ValueKind};
