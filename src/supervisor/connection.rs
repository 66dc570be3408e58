//! Connection supervisor.
//!
//! # Responsibilities
//! - Connect the feed and build a fresh feed session on every success
//! - Replace the previous subscription and registration set wholesale
//! - Arm the reconnect timer after a failure or a detected drop
//! - React to drops the feed reports, and poll connectivity (watchdog) for the rest
//!
//! # Design Decisions
//! - `connect` claims `Disconnected → Connecting` atomically; concurrent calls are no-ops
//! - Failures are logged and counted, never returned; reconnection is the recovery
//! - A session is all or nothing: if subscribe, any registration or apply fails,
//!   the subscription is disposed and the transport reset so the next tick retries
//! - Old subscription is disposed before the new registration set is installed,
//!   and the new subscription only starts delivering after the install
//! - The watchdog also runs while `Disconnected` with the timer parked, so a
//!   parked supervisor re-arms as soon as the transport goes away

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

use crate::config::ReconnectConfig;
use crate::feed::{Feed, FeedError, FeedSubscription};
use crate::observability::metrics;
use crate::routing::{RegistrationSet, SignalBinding, SignalRouter};
use crate::supervisor::state::ConnectionState;
use crate::supervisor::timer::ReconnectTimer;

/// Owns one machine's feed lifecycle.
pub struct ConnectionSupervisor {
    machine_id: String,
    feed: Arc<dyn Feed>,
    router: Arc<SignalRouter>,
    bindings: Vec<SignalBinding>,
    publishing_interval_ms: u64,
    state: watch::Sender<ConnectionState>,
    timer: ReconnectTimer,
    watchdog: Duration,
    subscription: Mutex<Option<Box<dyn FeedSubscription>>>,
}

#[derive(Clone, Copy)]
enum Wake {
    Reconnect(Instant),
    Watchdog(Instant),
}

impl ConnectionSupervisor {
    pub fn new(
        feed: Arc<dyn Feed>,
        router: Arc<SignalRouter>,
        bindings: Vec<SignalBinding>,
        publishing_interval_ms: u64,
        reconnect: &ReconnectConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            machine_id: router.machine_id().to_string(),
            feed,
            router,
            bindings,
            publishing_interval_ms,
            state,
            timer: ReconnectTimer::new(Duration::from_secs(reconnect.interval_secs)),
            watchdog: Duration::from_secs(reconnect.watchdog_secs),
            subscription: Mutex::new(None),
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn timer(&self) -> &ReconnectTimer {
        &self.timer
    }

    pub fn router(&self) -> &Arc<SignalRouter> {
        &self.router
    }

    /// Connect unless a connect is in flight or the feed is already up.
    pub async fn connect(&self) {
        self.timer.disarm();

        let claimed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            tracing::debug!(machine_id = %self.machine_id, state = %self.state(), "Connect skipped");
            return;
        }
        metrics::record_connection_state(&self.machine_id, ConnectionState::Connecting.gauge_value());

        match self.establish().await {
            Ok(session) => {
                metrics::record_connect_attempt(&self.machine_id, "success");
                self.transition(ConnectionState::Connected);
                tracing::info!(
                    machine_id = %self.machine_id,
                    session = %session,
                    endpoint = %self.feed.endpoint(),
                    "Feed connected"
                );
            }
            Err(e) => {
                metrics::record_connect_attempt(&self.machine_id, "failure");
                tracing::warn!(
                    machine_id = %self.machine_id,
                    endpoint = %self.feed.endpoint(),
                    error = %e,
                    retry_secs = self.timer.interval().as_secs(),
                    "Feed connect failed"
                );
                self.transition(ConnectionState::Disconnected);
                self.timer.arm();
            }
        }
    }

    async fn establish(&self) -> Result<Uuid, FeedError> {
        self.feed.connect().await?;

        match self.open_session().await {
            Ok(session) => Ok(session),
            Err(e) => {
                let previous = self.lock_subscription().take();
                if let Some(previous) = previous {
                    previous.dispose();
                }
                self.feed.disconnect().await;
                Err(e)
            }
        }
    }

    async fn open_session(&self) -> Result<Uuid, FeedError> {
        let session = Uuid::new_v4();
        let subscription = self
            .feed
            .subscribe(self.publishing_interval_ms, self.router.notification_callback(session))
            .await?;

        let mut set = RegistrationSet::new(session);
        for binding in &self.bindings {
            if let Err(e) = set.register(subscription.as_ref(), binding) {
                tracing::warn!(
                    machine_id = %self.machine_id,
                    session = %session,
                    signal = %binding.signal_name,
                    error = %e,
                    "Failed to register signal, abandoning session"
                );
                subscription.dispose();
                return Err(e);
            }
        }

        if let Some(previous) = self.lock_subscription().take() {
            previous.dispose();
        }
        self.router.install(set);

        if let Err(e) = subscription.apply_changes() {
            subscription.dispose();
            return Err(e);
        }
        *self.lock_subscription() = Some(subscription);
        Ok(session)
    }

    /// Reconnect timer callback.
    ///
    /// If the feed came back by another path while a subscription is still
    /// held, the timer parks itself instead of reconnecting.
    pub async fn reconnect_tick(&self) {
        if self.state() != ConnectionState::Disconnected {
            self.timer.disarm();
            return;
        }
        if self.feed.is_connected() && self.has_subscription() {
            tracing::debug!(machine_id = %self.machine_id, "Feed reports connected, reconnect timer disabled");
            self.timer.disarm();
            return;
        }
        self.connect().await;
    }

    /// Record a drop of a connected feed and schedule the reconnect.
    pub fn mark_disconnected(&self, reason: &str) {
        let dropped = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        if dropped {
            metrics::record_connection_state(&self.machine_id, ConnectionState::Disconnected.gauge_value());
            tracing::warn!(machine_id = %self.machine_id, reason, "Feed disconnected");
            self.timer.arm();
        }
    }

    /// Drive the reconnect timer, feed connectivity reports and the watchdog until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut connectivity = self.feed.connectivity();
        let mut reports_open = true;

        loop {
            let wake = match self.timer.deadline() {
                Some(deadline) => Wake::Reconnect(deadline),
                None => Wake::Watchdog(Instant::now() + self.watchdog),
            };
            let at = match wake {
                Wake::Reconnect(at) | Wake::Watchdog(at) => at,
            };

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = self.timer.changed() => continue,
                report = connectivity.changed(), if reports_open => match report {
                    Ok(()) => {
                        let up = *connectivity.borrow_and_update();
                        if !up {
                            self.connectivity_lost("feed reported connectivity loss");
                        }
                    }
                    Err(_) => reports_open = false,
                },
                _ = sleep_until(at) => match wake {
                    Wake::Reconnect(_) => self.reconnect_tick().await,
                    Wake::Watchdog(_) => {
                        if !self.feed.is_connected() {
                            self.connectivity_lost("feed reports no connectivity");
                        }
                    }
                },
            }
        }

        self.timer.disarm();
        if let Some(subscription) = self.lock_subscription().take() {
            subscription.dispose();
        }
        tracing::info!(machine_id = %self.machine_id, "Supervisor stopped");
    }

    fn connectivity_lost(&self, reason: &str) {
        match self.state() {
            ConnectionState::Connected => self.mark_disconnected(reason),
            ConnectionState::Disconnected if !self.timer.is_armed() => {
                tracing::info!(machine_id = %self.machine_id, reason, "Parked supervisor lost connectivity, rearming");
                self.timer.arm();
            }
            _ => {}
        }
    }

    fn has_subscription(&self) -> bool {
        self.lock_subscription().is_some()
    }

    fn transition(&self, to: ConnectionState) {
        self.state.send_replace(to);
        metrics::record_connection_state(&self.machine_id, to.gauge_value());
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<Box<dyn FeedSubscription>>> {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
