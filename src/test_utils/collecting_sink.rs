//! A diagnostic sink that accumulates messages in memory for assertions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::diagnostic::DiagnosticSink;

/// Sink that stores every message it receives for later inspection.
#[derive(Clone, Default)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of all messages received so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Number of messages containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|msg| msg.contains(needle))
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.count(needle) > 0
    }

    /// Share this sink as the trait object expected by the logger.
    pub fn as_sink(&self) -> Arc<dyn DiagnosticSink> {
        Arc::new(self.clone())
    }
}

impl DiagnosticSink for CollectingSink {
    fn write(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
