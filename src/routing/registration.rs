//! Signal bindings and per-session registration sets.
//!
//! # Responsibilities
//! - Describe the per-machine signal table (`SignalBinding`)
//! - Record what was registered with one feed subscription (`RegistrationSet`)
//!
//! # Design Decisions
//! - A set belongs to exactly one feed session and is replaced wholesale
//! - Registering the same signal name twice in a session is a no-op

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::feed::{FeedResult, FeedSubscription, ItemHandle};
use crate::routing::handler::HandlerChain;

/// One row of a machine's signal table: what to sample and who handles it.
#[derive(Clone)]
pub struct SignalBinding {
    pub node_address: String,
    pub signal_name: String,
    pub sampling_interval_ms: u64,
    pub handlers: HandlerChain,
}

impl SignalBinding {
    pub fn new(
        node_address: impl Into<String>,
        signal_name: impl Into<String>,
        sampling_interval_ms: u64,
        handlers: HandlerChain,
    ) -> Self {
        Self {
            node_address: node_address.into(),
            signal_name: signal_name.into(),
            sampling_interval_ms,
            handlers,
        }
    }
}

impl fmt::Debug for SignalBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBinding")
            .field("node_address", &self.node_address)
            .field("signal_name", &self.signal_name)
            .field("sampling_interval_ms", &self.sampling_interval_ms)
            .field("handlers", &self.handlers.iter().map(|h| h.name().to_string()).collect::<Vec<_>>())
            .finish()
    }
}

/// A signal registered with a live subscription.
pub struct Registration {
    pub item: ItemHandle,
    pub node_address: String,
    pub signal_name: String,
    pub sampling_interval_ms: u64,
    pub handlers: HandlerChain,
}

/// All registrations of one feed session.
pub struct RegistrationSet {
    session: Uuid,
    by_name: HashMap<String, Arc<Registration>>,
    by_item: HashMap<ItemHandle, String>,
}

impl RegistrationSet {
    /// Empty set for `session`.
    pub fn new(session: Uuid) -> Self {
        Self {
            session,
            by_name: HashMap::new(),
            by_item: HashMap::new(),
        }
    }

    /// Placeholder installed before the first session.
    pub fn empty() -> Self {
        Self::new(Uuid::nil())
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Register `binding` and forward it to the subscription's monitored items.
    ///
    /// Returns `Ok(false)` when the signal is already registered in this session.
    pub fn register(&mut self, subscription: &dyn FeedSubscription, binding: &SignalBinding) -> FeedResult<bool> {
        if self.by_name.contains_key(&binding.signal_name) {
            tracing::debug!(
                signal = %binding.signal_name,
                session = %self.session,
                "Signal already registered in this session"
            );
            return Ok(false);
        }

        let item = subscription.add_monitored_item(
            &binding.node_address,
            &binding.signal_name,
            binding.sampling_interval_ms,
        )?;

        let registration = Arc::new(Registration {
            item,
            node_address: binding.node_address.clone(),
            signal_name: binding.signal_name.clone(),
            sampling_interval_ms: binding.sampling_interval_ms,
            handlers: binding.handlers.clone(),
        });
        self.by_item.insert(item, binding.signal_name.clone());
        self.by_name.insert(binding.signal_name.clone(), registration);
        Ok(true)
    }

    pub fn get(&self, signal_name: &str) -> Option<&Arc<Registration>> {
        self.by_name.get(signal_name)
    }

    /// Signal name behind a monitored item.
    pub fn signal_for(&self, item: ItemHandle) -> Option<&str> {
        self.by_item.get(&item).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered signal names, sorted.
    pub fn signal_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}
