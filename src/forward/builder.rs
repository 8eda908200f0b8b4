//! Builder for [`FluentLogger`](super::FluentLogger).
//!
//! Unset options fall back to the defaults of
//! [`LoggerConfig`](super::LoggerConfig). Timeouts are given in milliseconds.

use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::diagnostic::DiagnosticSink;

use super::{
    config::{ConfigError, LoggerConfig},
    logger::FluentLogger,
};

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`FluentLogger`] instances.
#[derive(Clone, Default)]
pub struct FluentLoggerBuilder {
    tag_prefix: String,
    host: Option<String>,
    port: Option<u16>,
    socket_path: Option<PathBuf>,
    limit: Option<usize>,
    log_reconnect_error_threshold: Option<u64>,
    reconnect_error_suppress_secs: Option<u64>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl FluentLoggerBuilder {
    /// Create a builder whose events are tagged `<tag_prefix>.<tag>`.
    pub fn new(tag_prefix: impl Into<String>) -> Self {
        Self {
            tag_prefix: tag_prefix.into(),
            ..Self::default()
        }
    }

    option_setter!(
        #[doc = "Set the collector host."]
        with_host,
        host,
        String
    );
    option_setter!(
        #[doc = "Set the collector port."]
        with_port,
        port,
        u16
    );
    option_setter!(
        #[doc = "Connect through a unix domain socket instead of TCP."]
        with_socket_path,
        socket_path,
        PathBuf
    );
    option_setter!(
        #[doc = "Cap the bytes retained while the collector is unreachable."]
        with_limit,
        limit,
        usize
    );
    option_setter!(
        with_log_reconnect_error_threshold,
        log_reconnect_error_threshold,
        u64
    );
    option_setter!(
        with_reconnect_error_suppress_secs,
        reconnect_error_suppress_secs,
        u64
    );
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(
        #[doc = "Route diagnostics to the given sink."]
        with_sink,
        sink,
        Arc<dyn DiagnosticSink>
    );

    /// Resolve the options into a validated configuration.
    pub fn config(&self) -> Result<LoggerConfig, ConfigError> {
        let mut config = LoggerConfig::default();
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config.socket_path = self.socket_path.clone();
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(threshold) = self.log_reconnect_error_threshold {
            config.log_reconnect_error_threshold = threshold;
        }
        if let Some(secs) = self.reconnect_error_suppress_secs {
            config.reconnect_error_suppress_secs = secs;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(sink) = &self.sink {
            config.sink = Arc::clone(sink);
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the options and construct the logger.
    pub fn build(&self) -> Result<FluentLogger, ConfigError> {
        let config = self.config()?;
        Ok(FluentLogger::from_validated(&self.tag_prefix, config))
    }
}

impl std::fmt::Debug for FluentLoggerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluentLoggerBuilder")
            .field("tag_prefix", &self.tag_prefix)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket_path", &self.socket_path)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
