//! Live data feed abstraction.
//!
//! # Data Flow
//! ```text
//! Feed::connect()
//!     → Feed::subscribe(publishing_interval, callback)
//!     → FeedSubscription::add_monitored_item(node, name, sampling)   (per signal)
//!     → FeedSubscription::apply_changes()                           (delivery starts)
//!     → callback(item, value, source_timestamp)                      (feed's own context)
//!
//! On reconnect:
//!     old FeedSubscription::dispose()  → never delivers again
//!     new subscription takes over
//!
//! Connectivity:
//!     Feed::connectivity() → watch::Receiver<bool>   (transport reports drops)
//!     Feed::disconnect()   → transport reset after a half-built session
//! ```
//!
//! # Design Decisions
//! - The protocol transport lives behind these traits; the core never sees it
//! - Callbacks may fire from any thread, concurrently
//! - `memory.rs` is an in-process feed used by tests and the simulator

pub mod memory;
pub mod simulator;
pub mod types;

use async_trait::async_trait;
use tokio::sync::watch;

pub use memory::MemoryFeed;
pub use types::{
    FeedError, FeedResult, ItemHandle, NotificationCallback, SignalNotification, SignalValue,
    ValueMismatch,
};

/// Connection to one machine controller.
#[async_trait]
pub trait Feed: Send + Sync + 'static {
    /// Endpoint description used in logs.
    fn endpoint(&self) -> &str;

    /// Establish the session with the controller.
    async fn connect(&self) -> FeedResult<()>;

    /// Tear the transport session down. Idempotent.
    async fn disconnect(&self);

    /// Connectivity as currently reported by the transport.
    fn is_connected(&self) -> bool;

    /// Change notifications for [`is_connected`](Self::is_connected).
    ///
    /// Transports that cannot push drops may never notify; the supervisor
    /// polls as well.
    fn connectivity(&self) -> watch::Receiver<bool>;

    /// Create a subscription that reports item changes through `callback`.
    async fn subscribe(
        &self,
        publishing_interval_ms: u64,
        callback: NotificationCallback,
    ) -> FeedResult<Box<dyn FeedSubscription>>;
}

/// A live subscription owned by one feed session.
pub trait FeedSubscription: Send + Sync {
    /// Add a sampled item. Nothing is delivered until [`apply_changes`](Self::apply_changes).
    fn add_monitored_item(
        &self,
        node_address: &str,
        display_name: &str,
        sampling_interval_ms: u64,
    ) -> FeedResult<ItemHandle>;

    /// Commit pending items and start delivery.
    fn apply_changes(&self) -> FeedResult<()>;

    /// Stop delivery permanently.
    fn dispose(&self);
}
