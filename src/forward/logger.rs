//! The forwarding client.

use std::{borrow::Cow, sync::Arc};

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use thiserror::Error;

use crate::{diagnostic::DiagnosticSink, value::RecordValue};

use super::{
    backlog::{Append, Backlog},
    builder::FluentLoggerBuilder,
    config::{ConfigError, LoggerConfig},
    serialise::{Event, encode_event, encode_into},
    throttle::ReconnectThrottle,
    transport::{Connection, ConnectionError, Endpoint},
};

/// Caller errors rejected before any encoding or I/O happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PostError {
    #[error("record must be a map, got {found}")]
    InvalidRecord { found: &'static str },
}

/// Combined view of the connection and the backlog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoggerState {
    Connected,
    Disconnected,
    /// Disconnected with undelivered data waiting for the next send.
    DisconnectedWithBacklog,
}

struct ForwardState {
    connection: Connection,
    backlog: Backlog,
    throttle: ReconnectThrottle,
}

/// Forwards events to a fluentd-style collector.
///
/// Every call performs its I/O synchronously and resolves before returning.
/// Network failures are reported to the diagnostic sink and surface as a
/// `false` result; undelivered payloads are kept (up to the configured limit)
/// and retried ahead of the next event.
pub struct FluentLogger {
    tag_prefix: Option<String>,
    sink: Arc<dyn DiagnosticSink>,
    state: Mutex<ForwardState>,
}

impl FluentLogger {
    /// Construct a logger targeting `host:port` with default settings.
    pub fn new(
        tag_prefix: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Result<Self, ConfigError> {
        Self::with_config(tag_prefix, LoggerConfig::default().with_address(host, port))
    }

    /// Construct a logger from a full configuration.
    pub fn with_config(
        tag_prefix: impl Into<String>,
        config: LoggerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tag_prefix: String = tag_prefix.into();
        Ok(Self::from_validated(&tag_prefix, config))
    }

    /// Start a builder for a logger using `tag_prefix`.
    pub fn builder(tag_prefix: impl Into<String>) -> FluentLoggerBuilder {
        FluentLoggerBuilder::new(tag_prefix)
    }

    pub(crate) fn from_validated(tag_prefix: &str, config: LoggerConfig) -> Self {
        let connection = Connection::new(
            config.endpoint(),
            config.connect_timeout,
            config.write_timeout,
        );
        let state = ForwardState {
            connection,
            backlog: Backlog::new(config.limit),
            throttle: ReconnectThrottle::new(
                config.log_reconnect_error_threshold,
                config.reconnect_error_suppress_secs,
            ),
        };
        Self {
            tag_prefix: (!tag_prefix.is_empty()).then(|| tag_prefix.to_string()),
            sink: config.sink,
            state: Mutex::new(state),
        }
    }

    /// Post `record` under `tag`, stamped with the current time.
    pub fn post(&self, tag: &str, record: impl Into<RecordValue>) -> Result<bool, PostError> {
        self.post_with_time(tag, record, Utc::now())
    }

    /// Post `record` under `tag` with an explicit timestamp.
    ///
    /// Returns `Ok(true)` once the event (and any backlog ahead of it) has
    /// been written to the socket, and `Ok(false)` when it could not be
    /// encoded or sent. Only a non-map record is an error.
    pub fn post_with_time(
        &self,
        tag: &str,
        record: impl Into<RecordValue>,
        time: DateTime<Utc>,
    ) -> Result<bool, PostError> {
        let record = record.into();
        if !record.is_map() {
            return Err(PostError::InvalidRecord {
                found: record.type_name(),
            });
        }
        let tag = self.full_tag(tag);
        let payload = match encode_event(&tag, time.timestamp(), &record) {
            Ok(payload) => payload,
            Err(err) => {
                self.sink.write(&format!(
                    "FluentLogger: Can't convert to msgpack: {tag} {record:?}: {err}"
                ));
                return Ok(false);
            }
        };
        Ok(self.write(payload))
    }

    /// Encode every event into one payload and send it in a single write.
    ///
    /// Tags receive the logger's prefix. Records are not required to be
    /// maps. The backlog limit only applies if the batch has to be retained.
    pub fn batch_post_with_time(&self, events: &[Event]) -> bool {
        if events.is_empty() {
            return true;
        }
        let mut payload = Vec::with_capacity(events.len().saturating_mul(64));
        for event in events {
            let tag = self.full_tag(&event.tag);
            if let Err(err) = encode_into(&mut payload, &tag, event.time, &event.record) {
                self.sink.write(&format!(
                    "FluentLogger: Can't convert to msgpack: batch of {} events: {tag}: {err}",
                    events.len()
                ));
                return false;
            }
        }
        self.write(payload)
    }

    /// Try to deliver retained data now.
    ///
    /// Returns `true` when nothing remains in the backlog.
    pub fn flush(&self) -> bool {
        let mut notes = Vec::new();
        let flushed = {
            let mut state = self.state.lock();
            Self::flush_backlog(&mut state, &mut notes)
        };
        self.report(notes);
        flushed
    }

    /// Disconnect from the collector.
    ///
    /// Retained data gets one delivery attempt first. If that fails it stays
    /// in the backlog for a later post.
    pub fn close(&self) {
        let mut notes = Vec::new();
        {
            let mut state = self.state.lock();
            Self::flush_backlog(&mut state, &mut notes);
            state.connection.close();
        }
        self.report(notes);
    }

    /// Whether a socket to the collector is currently open.
    pub fn connected(&self) -> bool {
        self.state.lock().connection.connected()
    }

    /// Combined connection and backlog state.
    pub fn state(&self) -> LoggerState {
        let state = self.state.lock();
        match (state.connection.connected(), state.backlog.is_empty()) {
            (true, _) => LoggerState::Connected,
            (false, true) => LoggerState::Disconnected,
            (false, false) => LoggerState::DisconnectedWithBacklog,
        }
    }

    /// Bytes currently retained for retry.
    pub fn pending_bytes(&self) -> usize {
        self.state.lock().backlog.size()
    }

    /// Maximum number of bytes the backlog may retain.
    pub fn limit(&self) -> usize {
        self.state.lock().backlog.limit()
    }

    /// Change the backlog limit. Already retained data is kept.
    pub fn set_limit(&self, limit: usize) {
        self.state.lock().backlog.set_limit(limit);
    }

    /// Report connection failures once per `threshold` consecutive failures.
    pub fn set_log_reconnect_error_threshold(&self, threshold: u64) {
        self.state.lock().throttle.set_threshold(threshold);
    }

    /// The collector this logger sends to.
    pub fn endpoint(&self) -> Endpoint {
        self.state.lock().connection.endpoint().clone()
    }

    /// Prefix joined to every tag with a `.`, if any.
    pub fn tag_prefix(&self) -> Option<&str> {
        self.tag_prefix.as_deref()
    }

    fn full_tag<'a>(&self, tag: &'a str) -> Cow<'a, str> {
        match &self.tag_prefix {
            Some(prefix) => Cow::Owned(format!("{prefix}.{tag}")),
            None => Cow::Borrowed(tag),
        }
    }

    /// Write collected diagnostics. Must be called without the state lock
    /// held, since a sink may call back into the logger.
    fn report(&self, notes: Vec<String>) {
        for note in notes {
            self.sink.write(&note);
        }
    }

    /// Send the backlog followed by `payload` as one write.
    fn write(&self, payload: Vec<u8>) -> bool {
        let mut notes = Vec::new();
        let delivered = {
            let mut state = self.state.lock();
            Self::send_with_backlog(&mut state, payload, &mut notes)
        };
        self.report(notes);
        delivered
    }

    /// On failure the drained backlog is put back untouched and only
    /// `payload` is offered to the backlog, so the limit decides the fate of
    /// the newest data alone.
    fn send_with_backlog(
        state: &mut ForwardState,
        payload: Vec<u8>,
        notes: &mut Vec<String>,
    ) -> bool {
        let retained = state.backlog.drain();
        let result = if retained.is_empty() {
            state.connection.send(&payload)
        } else {
            let mut combined = Vec::with_capacity(retained.len() + payload.len());
            combined.extend_from_slice(&retained);
            combined.extend_from_slice(&payload);
            state.connection.send(&combined)
        };

        match result {
            Ok(()) => {
                if !retained.is_empty() {
                    debug!(
                        "FluentLogger delivered {} retained bytes to {}",
                        retained.len(),
                        state.connection.endpoint()
                    );
                }
                Self::record_success(state);
                true
            }
            Err(err) => {
                state.connection.close();
                state.backlog.requeue(retained);
                if state.backlog.try_append(payload) == Append::Rejected {
                    notes.push(format!(
                        "FluentLogger: Can't send logs to {}: {}",
                        state.connection.endpoint(),
                        err.io_error()
                    ));
                }
                Self::record_failure(state, &err, notes);
                false
            }
        }
    }

    fn flush_backlog(state: &mut ForwardState, notes: &mut Vec<String>) -> bool {
        if state.backlog.is_empty() {
            return true;
        }
        let retained = state.backlog.drain();
        match state.connection.send(&retained) {
            Ok(()) => {
                debug!(
                    "FluentLogger flushed {} retained bytes to {}",
                    retained.len(),
                    state.connection.endpoint()
                );
                Self::record_success(state);
                true
            }
            Err(err) => {
                let size = retained.len();
                state.connection.close();
                state.backlog.requeue(retained);
                notes.push(format!(
                    "FluentLogger: Can't send logs to {}: {size} bytes retained: {}",
                    state.connection.endpoint(),
                    err.io_error()
                ));
                Self::record_failure(state, &err, notes);
                false
            }
        }
    }

    fn record_success(state: &mut ForwardState) {
        let failures = state.throttle.record_success();
        if failures > 0 {
            info!(
                "FluentLogger reconnected to {} after {failures} failures",
                state.connection.endpoint()
            );
        }
    }

    fn record_failure(state: &mut ForwardState, err: &ConnectionError, notes: &mut Vec<String>) {
        if !state.throttle.record_failure() {
            return;
        }
        let endpoint = state.connection.endpoint();
        let failures = state.throttle.failures();
        let action = if err.is_connect() {
            "connect to"
        } else {
            "send to"
        };
        notes.push(format!(
            "FluentLogger: Failed to {action} {endpoint} ({failures} failures): {}",
            err.io_error()
        ));
    }
}

impl Drop for FluentLogger {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for FluentLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FluentLogger")
            .field("tag_prefix", &self.tag_prefix)
            .field("connection", &state.connection)
            .field("pending_bytes", &state.backlog.size())
            .finish()
    }
}
