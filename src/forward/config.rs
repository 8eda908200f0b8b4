//! Configuration consumed by [`FluentLogger`](super::FluentLogger).
//!
//! [`FluentLoggerBuilder`](super::FluentLoggerBuilder) produces these values,
//! and [`FluentLogger::with_config`](super::FluentLogger::with_config) accepts
//! them directly. Either way the configuration is validated once, before a
//! logger exists.

use std::{fmt, path::PathBuf, sync::Arc, time::Duration};

use thiserror::Error;

use crate::diagnostic::{DiagnosticSink, StderrSink};

use super::transport::Endpoint;

/// Default collector host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default fluentd forward port.
pub const DEFAULT_PORT: u16 = 24224;
/// Default backlog limit. Effectively unbounded.
pub const DEFAULT_LIMIT: usize = usize::MAX;
/// Consecutive connect failures per reported diagnostic.
pub const DEFAULT_RECONNECT_ERROR_THRESHOLD: u64 = 1;
/// Default connection timeout applied when establishing sockets.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid user supplied configuration.
    #[error("invalid logger configuration: {0}")]
    Invalid(String),
}

/// Settings for a [`FluentLogger`](super::FluentLogger).
#[derive(Clone)]
pub struct LoggerConfig {
    /// Collector host name or address.
    pub host: String,
    /// Collector TCP port.
    pub port: u16,
    /// Unix socket path. Takes precedence over `host`/`port` when set.
    pub socket_path: Option<PathBuf>,
    /// Byte cap on retained, unsent payloads.
    pub limit: usize,
    /// Consecutive connection failures per reported diagnostic.
    pub log_reconnect_error_threshold: u64,
    /// Minimum seconds between two connection-failure reports.
    pub reconnect_error_suppress_secs: u64,
    /// Upper bound on each connection attempt.
    pub connect_timeout: Duration,
    /// `None` lets writes block indefinitely.
    pub write_timeout: Option<Duration>,
    /// Destination for operational messages.
    pub sink: Arc<dyn DiagnosticSink>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            socket_path: None,
            limit: DEFAULT_LIMIT,
            log_reconnect_error_threshold: DEFAULT_RECONNECT_ERROR_THRESHOLD,
            reconnect_error_suppress_secs: 0,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            sink: Arc::new(StderrSink),
        }
    }
}

impl LoggerConfig {
    /// Target the collector at `host:port`.
    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self.socket_path = None;
        self
    }

    /// Target a Unix domain socket instead of TCP.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Cap the bytes retained while the collector is unreachable.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Report one connection failure per `threshold` consecutive failures.
    pub fn with_log_reconnect_error_threshold(mut self, threshold: u64) -> Self {
        self.log_reconnect_error_threshold = threshold;
        self
    }

    /// Minimum number of seconds between two failure reports.
    pub fn with_reconnect_error_suppress_secs(mut self, secs: u64) -> Self {
        self.reconnect_error_suppress_secs = secs;
        self
    }

    /// Bound each connection attempt.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound each socket write. `None` blocks indefinitely.
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Route diagnostics to `sink` instead of standard error.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The endpoint the logger will connect to.
    pub fn endpoint(&self) -> Endpoint {
        match &self.socket_path {
            Some(path) => Endpoint::Unix { path: path.clone() },
            None => Endpoint::Tcp {
                host: self.host.clone(),
                port: self.port,
            },
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match &self.socket_path {
            Some(path) if path.as_os_str().is_empty() => {
                return Err(invalid("socket_path must not be empty"));
            }
            Some(_) => {}
            None => {
                if self.host.trim().is_empty() {
                    return Err(invalid("host must not be empty"));
                }
                if self.port == 0 {
                    return Err(invalid("port must be greater than zero"));
                }
            }
        }
        if self.limit == 0 {
            return Err(invalid("limit must be greater than zero"));
        }
        if self.log_reconnect_error_threshold == 0 {
            return Err(invalid(
                "log_reconnect_error_threshold must be greater than zero",
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(invalid("connect_timeout must be greater than zero"));
        }
        if self.write_timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid("write_timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket_path", &self.socket_path)
            .field("limit", &self.limit)
            .field(
                "log_reconnect_error_threshold",
                &self.log_reconnect_error_threshold,
            )
            .field(
                "reconnect_error_suppress_secs",
                &self.reconnect_error_suppress_secs,
            )
            .field("connect_timeout", &self.connect_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}
