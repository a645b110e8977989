//! Warning channel: sinks observing human-readable advisory messages.

use std::sync::{Arc, Mutex};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Receives warnings as they are raised, synchronously.
pub trait WarningSink: Send + Sync {
    fn warn(&self, message: &str);
}

/// Insertion-ordered set of distinct warning messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningLog {
    messages: IndexSet<String>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message. Returns false if it was already present.
    pub fn push(&mut self, message: impl Into<String>) -> bool {
        self.messages.insert(message.into())
    }

    /// Append the messages of `other` that are not yet present, keeping order.
    pub fn merge(&mut self, other: &WarningLog) {
        for message in &other.messages {
            if !self.messages.contains(message) {
                self.messages.insert(message.clone());
            }
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    pub fn contains(&self, message: &str) -> bool {
        self.messages.contains(message)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.messages.iter().cloned().collect()
    }
}

impl FromIterator<String> for WarningLog {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

/// Sink that forwards every warning to `tracing` at WARN level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "tukey::warning", "{}", message);
    }
}

/// Thread-safe collecting sink, shareable across partitions.
#[derive(Debug, Default)]
pub struct CollectingSink {
    log: Mutex<WarningLog>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the collected warnings.
    pub fn log(&self) -> WarningLog {
        match self.log.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl WarningSink for CollectingSink {
    fn warn(&self, message: &str) {
        let mut guard = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(message);
    }
}

/// Records a warning in `log` and notifies every sink once per distinct message.
pub(crate) fn raise(log: &mut WarningLog, sinks: &[Arc<dyn WarningSink>], message: &str) {
    if log.push(message) {
        for sink in sinks {
            sink.warn(message);
        }
    }
}
