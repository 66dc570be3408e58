//! Suspension set.
//!
//! Names of signals whose notifications are currently muted. Shared between
//! the router (reader) and the correlator (writer) of one machine.

use dashmap::DashSet;
use std::sync::Arc;

/// Thread-safe set of suspended signal names.
#[derive(Debug, Clone, Default)]
pub struct SuspensionSet {
    inner: Arc<DashSet<String>>,
}

impl SuspensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mute `signal`. Returns false if it was already muted.
    pub fn suspend(&self, signal: &str) -> bool {
        self.inner.insert(signal.to_string())
    }

    /// Unmute `signal`. Returns false if it was not muted.
    pub fn resume(&self, signal: &str) -> bool {
        self.inner.remove(signal).is_some()
    }

    pub fn contains(&self, signal: &str) -> bool {
        self.inner.contains(signal)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of the muted names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.iter().map(|n| n.key().clone()).collect();
        names.sort();
        names
    }
}
