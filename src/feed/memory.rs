//! In-process feed.
//!
//! Behaves like a controller session without any transport: connect outcomes
//! subscribe and monitored-item outcomes can be scripted, connectivity can be
//! dropped loudly or quietly, and values are injected with
//! [`MemoryFeed::publish`]. Delivery honours the subscription contract
//! (nothing before `apply_changes`, nothing after `dispose`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

use crate::feed::types::{FeedError, FeedResult, ItemHandle, NotificationCallback, SignalValue};
use crate::feed::{Feed, FeedSubscription};

#[derive(Debug, Clone)]
struct MonitoredItem {
    handle: ItemHandle,
    node_address: String,
    display_name: String,
    sampling_interval_ms: u64,
}

struct SubscriptionShared {
    publishing_interval_ms: u64,
    callback: NotificationCallback,
    items: Mutex<Vec<MonitoredItem>>,
    next_handle: AtomicU32,
    applied: AtomicBool,
    disposed: AtomicBool,
}

impl SubscriptionShared {
    fn is_live(&self) -> bool {
        self.applied.load(Ordering::Acquire) && !self.disposed.load(Ordering::Acquire)
    }
}

/// Feed backed by process memory.
pub struct MemoryFeed {
    endpoint: String,
    connected: watch::Sender<bool>,
    connect_attempts: AtomicUsize,
    disconnects: AtomicUsize,
    connect_delay: Mutex<Duration>,
    connect_script: Mutex<VecDeque<Result<(), String>>>,
    subscribe_script: Arc<Mutex<VecDeque<String>>>,
    rejected_nodes: Arc<Mutex<HashSet<String>>>,
    subscriptions: Mutex<Vec<Arc<SubscriptionShared>>>,
}

impl MemoryFeed {
    /// Create a disconnected feed. Unscripted connects succeed.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            endpoint: endpoint.into(),
            connected,
            connect_attempts: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            connect_delay: Mutex::new(Duration::ZERO),
            connect_script: Mutex::new(VecDeque::new()),
            subscribe_script: Arc::new(Mutex::new(VecDeque::new())),
            rejected_nodes: Arc::new(Mutex::new(HashSet::new())),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `count` connect attempts fail with `reason`.
    pub fn fail_next_connects(&self, count: usize, reason: &str) {
        let mut script = self.connect_script.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..count {
            script.push_back(Err(reason.to_string()));
        }
    }

    /// Make the next `count` subscribe calls fail with `reason` (after a successful connect).
    pub fn fail_next_subscribes(&self, count: usize, reason: &str) {
        let mut script = self.subscribe_script.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..count {
            script.push_back(reason.to_string());
        }
    }

    /// Reject monitored items for `node_address` until [`accept_node`](Self::accept_node).
    pub fn reject_node(&self, node_address: &str) {
        self.rejected_nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_address.to_string());
    }

    pub fn accept_node(&self, node_address: &str) {
        self.rejected_nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(node_address);
    }

    /// Hold every connect attempt for `delay` before it resolves.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Simulate the transport dropping (or restoring) the session and report it to watchers.
    pub fn set_connected(&self, connected: bool) {
        self.connected.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
    }

    /// Change connectivity without notifying watchers; only polling sees it.
    pub fn set_connected_quietly(&self, connected: bool) {
        self.connected.send_if_modified(|current| {
            *current = connected;
            false
        });
    }

    /// Number of times `connect` has been called.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::Acquire)
    }

    /// Number of times `disconnect` has been called.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::Acquire)
    }

    /// Subscriptions that are applied and not disposed.
    pub fn live_subscriptions(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.is_live())
            .count()
    }

    /// Total subscriptions ever created.
    pub fn total_subscriptions(&self) -> usize {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Publishing interval requested by the most recent subscription.
    pub fn last_publishing_interval_ms(&self) -> Option<u64> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|s| s.publishing_interval_ms)
    }

    /// Sampling interval of `node_address` in the most recent subscription.
    pub fn sampling_interval_ms(&self, node_address: &str) -> Option<u64> {
        let subs = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        let last = subs.last()?;
        let items = last.items.lock().unwrap_or_else(PoisonError::into_inner);
        items
            .iter()
            .find(|i| i.node_address == node_address)
            .map(|i| i.sampling_interval_ms)
    }

    /// Deliver a value change for `node_address` to every live subscription.
    ///
    /// Returns the number of callbacks invoked.
    pub fn publish(&self, node_address: &str, value: SignalValue, source_timestamp: DateTime<Utc>) -> usize {
        // Collect targets first so callbacks run without holding any feed lock.
        let targets: Vec<(NotificationCallback, ItemHandle)> = {
            let subs = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
            subs.iter()
                .filter(|s| s.is_live())
                .flat_map(|s| {
                    let items = s.items.lock().unwrap_or_else(PoisonError::into_inner);
                    items
                        .iter()
                        .filter(|i| i.node_address == node_address)
                        .map(|i| (Arc::clone(&s.callback), i.handle))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        for (callback, handle) in &targets {
            callback(*handle, value, source_timestamp);
        }
        targets.len()
    }

    /// Display names registered on the most recent subscription.
    pub fn monitored_names(&self) -> Vec<String> {
        let subs = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        subs.last()
            .map(|s| {
                s.items
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .map(|i| i.display_name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Feed for MemoryFeed {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connect(&self) -> FeedResult<()> {
        self.connect_attempts.fetch_add(1, Ordering::AcqRel);
        let delay = *self.connect_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .connect_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match scripted {
            Some(Err(reason)) => {
                self.set_connected(false);
                Err(FeedError::Connect {
                    endpoint: self.endpoint.clone(),
                    reason,
                })
            }
            _ => {
                self.set_connected(true);
                Ok(())
            }
        }
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::AcqRel);
        self.set_connected(false);
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    async fn subscribe(
        &self,
        publishing_interval_ms: u64,
        callback: NotificationCallback,
    ) -> FeedResult<Box<dyn FeedSubscription>> {
        if !self.is_connected() {
            return Err(FeedError::NotConnected);
        }
        let scripted = self
            .subscribe_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(reason) = scripted {
            return Err(FeedError::Subscription(reason));
        }

        let shared = Arc::new(SubscriptionShared {
            publishing_interval_ms,
            callback,
            items: Mutex::new(Vec::new()),
            next_handle: AtomicU32::new(1),
            applied: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&shared));

        Ok(Box::new(MemorySubscription {
            shared,
            rejected_nodes: Arc::clone(&self.rejected_nodes),
        }))
    }
}

struct MemorySubscription {
    shared: Arc<SubscriptionShared>,
    rejected_nodes: Arc<Mutex<HashSet<String>>>,
}

impl FeedSubscription for MemorySubscription {
    fn add_monitored_item(
        &self,
        node_address: &str,
        display_name: &str,
        sampling_interval_ms: u64,
    ) -> FeedResult<ItemHandle> {
        if self.shared.disposed.load(Ordering::Acquire) {
            return Err(FeedError::Subscription("subscription disposed".to_string()));
        }
        if node_address.trim().is_empty() {
            return Err(FeedError::MonitoredItem {
                node: node_address.to_string(),
                reason: "empty node address".to_string(),
            });
        }
        let rejected = self
            .rejected_nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(node_address);
        if rejected {
            return Err(FeedError::MonitoredItem {
                node: node_address.to_string(),
                reason: "BadNodeIdUnknown".to_string(),
            });
        }

        let handle = ItemHandle(self.shared.next_handle.fetch_add(1, Ordering::AcqRel));
        self.shared
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MonitoredItem {
                handle,
                node_address: node_address.to_string(),
                display_name: display_name.to_string(),
                sampling_interval_ms,
            });
        Ok(handle)
    }

    fn apply_changes(&self) -> FeedResult<()> {
        if self.shared.disposed.load(Ordering::Acquire) {
            return Err(FeedError::Subscription("subscription disposed".to_string()));
        }
        self.shared.applied.store(true, Ordering::Release);
        Ok(())
    }

    fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_callback() -> (NotificationCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let callback: NotificationCallback = Arc::new(move |_, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    #[tokio::test]
    async fn test_scripted_connect_failures() {
        let feed = MemoryFeed::new("opc.tcp://test");
        feed.fail_next_connects(2, "refused");

        assert!(feed.connect().await.is_err());
        assert!(feed.connect().await.is_err());
        assert!(!feed.is_connected());
        assert!(feed.connect().await.is_ok());
        assert!(feed.is_connected());
        assert_eq!(feed.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_connectivity_reports_changes() {
        let feed = MemoryFeed::new("opc.tcp://test");
        let mut rx = feed.connectivity();

        feed.connect().await.unwrap();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        feed.set_connected_quietly(false);
        assert!(!feed.is_connected());
        assert!(!rx.has_changed().unwrap());

        feed.set_connected(true);
        feed.disconnect().await;
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert_eq!(feed.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_scripted_subscribe_and_item_failures() {
        let feed = MemoryFeed::new("opc.tcp://test");
        feed.connect().await.unwrap();
        feed.fail_next_subscribes(1, "BadTooManySubscriptions");
        feed.reject_node("ns=4;s=Missing");

        let (callback, _) = counting_callback();
        assert!(matches!(
            feed.subscribe(1000, callback.clone()).await,
            Err(FeedError::Subscription(_))
        ));

        let sub = feed.subscribe(1000, callback).await.unwrap();
        assert!(matches!(
            sub.add_monitored_item("ns=4;s=Missing", "Missing", 500),
            Err(FeedError::MonitoredItem { .. })
        ));
        feed.accept_node("ns=4;s=Missing");
        assert!(sub.add_monitored_item("ns=4;s=Missing", "Missing", 500).is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let feed = MemoryFeed::new("opc.tcp://test");
        let (callback, _) = counting_callback();
        assert!(matches!(
            feed.subscribe(1000, callback).await,
            Err(FeedError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_delivery_window() {
        let feed = MemoryFeed::new("opc.tcp://test");
        feed.connect().await.unwrap();
        let (callback, count) = counting_callback();
        let sub = feed.subscribe(1000, callback).await.unwrap();
        sub.add_monitored_item("ns=4;s=A", "A", 500).unwrap();

        // Not applied yet.
        assert_eq!(feed.publish("ns=4;s=A", SignalValue::Integer(1), Utc::now()), 0);

        sub.apply_changes().unwrap();
        assert_eq!(feed.publish("ns=4;s=A", SignalValue::Integer(2), Utc::now()), 1);
        assert_eq!(feed.publish("ns=4;s=B", SignalValue::Integer(2), Utc::now()), 0);
        assert_eq!(feed.sampling_interval_ms("ns=4;s=A"), Some(500));

        sub.dispose();
        assert_eq!(feed.publish("ns=4;s=A", SignalValue::Integer(3), Utc::now()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(feed.live_subscriptions(), 0);
    }
}
