//! Suppression of repeated connection-failure diagnostics.
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in whole seconds.
pub type TimeProvider = Box<dyn Fn() -> u64 + Send + Sync>;

/// Counts consecutive connection failures and decides when to report them.
///
/// A report is due on every `threshold`-th consecutive failure, provided the
/// previous report is at least `suppress_secs` old. A success resets the
/// count but not the suppression window.
pub struct ReconnectThrottle {
    threshold: u64,
    suppress_secs: u64,
    failures: u64,
    last_report: Option<u64>,
    time_provider: TimeProvider,
}

impl ReconnectThrottle {
    /// Create a throttle driven by the system clock. A zero `threshold`
    /// is treated as one.
    pub fn new(threshold: u64, suppress_secs: u64) -> Self {
        Self::with_time_provider(threshold, suppress_secs, Box::new(system_time_provider))
    }

    /// Create a throttle reading the time in seconds from `time_provider`.
    pub fn with_time_provider(
        threshold: u64,
        suppress_secs: u64,
        time_provider: TimeProvider,
    ) -> Self {
        Self {
            threshold: threshold.max(1),
            suppress_secs,
            failures: 0,
            last_report: None,
            time_provider,
        }
    }

    /// Record a failure, returning `true` when it should be reported.
    pub fn record_failure(&mut self) -> bool {
        self.failures = self.failures.saturating_add(1);
        if self.failures % self.threshold != 0 {
            return false;
        }
        let now = (self.time_provider)();
        if let Some(prev) = self.last_report
            && now.saturating_sub(prev) < self.suppress_secs
        {
            return false;
        }
        self.last_report = Some(now);
        true
    }

    /// Reset the failure count, returning how many failures preceded it.
    pub fn record_success(&mut self) -> u64 {
        std::mem::take(&mut self.failures)
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn set_threshold(&mut self, threshold: u64) {
        self.threshold = threshold.max(1);
    }
}

impl std::fmt::Debug for ReconnectThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectThrottle")
            .field("threshold", &self.threshold)
            .field("suppress_secs", &self.suppress_secs)
            .field("failures", &self.failures)
            .finish()
    }
}

/// Returns the current time in seconds since the UNIX epoch.
///
/// Returns 0 if the system clock is before the UNIX epoch.
pub fn system_time_provider() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
