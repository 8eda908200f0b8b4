//! Event forwarding over a persistent socket.
//!
//! This module defines [`FluentLogger`], a client that encodes events as
//! MessagePack `[tag, time, record]` arrays and writes them to a fluentd-style
//! collector. Sends happen synchronously on the caller's thread. Payloads that
//! cannot be delivered are retained in a bounded backlog and retried ahead of
//! the next event, and repeated connection failures are reported through a
//! throttle so a long outage does not flood the diagnostic sink.

mod backlog;
mod builder;
mod config;
mod logger;
mod serialise;
mod throttle;
mod transport;


pub use backlog::{Append, Backlog};
pub use builder::FluentLoggerBuilder;
pub use config::{
    ConfigError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_LIMIT, DEFAULT_PORT,
    DEFAULT_RECONNECT_ERROR_THRESHOLD, DEFAULT_WRITE_TIMEOUT, LoggerConfig,
};
pub use logger::{FluentLogger, LoggerState, PostError};
pub use serialise::{EncodeError, Event, encode_batch, encode_event, to_portable};
pub use throttle::{ReconnectThrottle, TimeProvider, system_time_provider};
pub use transport::{Connection, ConnectionError, ConnectionState, Endpoint};
