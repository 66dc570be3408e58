//! Signal routing and dispatch.
//!
//! # Responsibilities
//! - Hold the registration set of the current feed session
//! - Resolve incoming notifications to their handler chain
//! - Gate delivery through the suspension set
//!
//! # Design Decisions
//! - The registration set is swapped atomically (`ArcSwap`); dispatch never locks
//! - Notifications tagged with a replaced session are dropped
//! - Handlers run in registration order; a failing or panicking handler is
//!   logged and the chain continues

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

use crate::feed::{ItemHandle, NotificationCallback, SignalNotification, SignalValue};
use crate::observability::metrics;
use crate::routing::registration::RegistrationSet;
use crate::routing::suspension::SuspensionSet;

/// What happened to a dispatched notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handlers ran; `failures` of them reported an error or panicked.
    Delivered { handlers: usize, failures: usize },
    /// The signal is suspended; nothing ran.
    Suspended,
    /// No registration for this signal in the current session.
    Unknown,
    /// The notification belongs to a session that is no longer installed.
    StaleSession,
}

/// Routes notifications of one machine to registered handler chains.
pub struct SignalRouter {
    machine_id: String,
    registrations: ArcSwap<RegistrationSet>,
    suspended: SuspensionSet,
}

impl SignalRouter {
    pub fn new(machine_id: impl Into<String>, suspended: SuspensionSet) -> Self {
        Self {
            machine_id: machine_id.into(),
            registrations: ArcSwap::from_pointee(RegistrationSet::empty()),
            suspended,
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Session of the installed registration set (nil before the first session).
    pub fn session(&self) -> Uuid {
        self.registrations.load().session()
    }

    /// Current registration set.
    pub fn registrations(&self) -> Arc<RegistrationSet> {
        self.registrations.load_full()
    }

    /// Replace the registration set wholesale. Returns the previous one.
    pub fn install(&self, set: RegistrationSet) -> Arc<RegistrationSet> {
        tracing::info!(
            machine_id = %self.machine_id,
            session = %set.session(),
            signals = set.len(),
            "Installing signal registrations"
        );
        self.registrations.swap(Arc::new(set))
    }

    /// Callback for a subscription created in `session`.
    pub fn notification_callback(self: &Arc<Self>, session: Uuid) -> NotificationCallback {
        let router = Arc::clone(self);
        Arc::new(move |item, value, timestamp| {
            router.deliver(session, item, value, timestamp);
        })
    }

    /// Entry point for raw feed deliveries.
    pub fn deliver(
        &self,
        session: Uuid,
        item: ItemHandle,
        value: SignalValue,
        source_timestamp: DateTime<Utc>,
    ) -> DispatchOutcome {
        let set = self.registrations.load();
        if set.session() != session {
            tracing::trace!(
                machine_id = %self.machine_id,
                session = %session,
                item = %item,
                "Dropping notification from replaced session"
            );
            return DispatchOutcome::StaleSession;
        }

        let Some(signal_name) = set.signal_for(item) else {
            tracing::debug!(machine_id = %self.machine_id, item = %item, "Notification for unknown item");
            return DispatchOutcome::Unknown;
        };

        let notification = SignalNotification::new(signal_name, value, source_timestamp);
        drop(set);
        self.dispatch(&notification)
    }

    /// Run the handler chain registered for `notification.signal_name`.
    pub fn dispatch(&self, notification: &SignalNotification) -> DispatchOutcome {
        let set = self.registrations.load();
        let Some(registration) = set.get(&notification.signal_name) else {
            tracing::debug!(
                machine_id = %self.machine_id,
                signal = %notification.signal_name,
                "No registration for signal"
            );
            return DispatchOutcome::Unknown;
        };

        if self.suspended.contains(&notification.signal_name) {
            tracing::trace!(
                machine_id = %self.machine_id,
                signal = %notification.signal_name,
                "Signal suspended, notification dropped"
            );
            metrics::record_suppressed(&self.machine_id, &notification.signal_name);
            return DispatchOutcome::Suspended;
        }

        metrics::record_notification(&self.machine_id, &notification.signal_name);

        let mut failures = 0;
        for handler in &registration.handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(notification)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("handler panicked: {}", panic_message(payload.as_ref())),
            };

            failures += 1;
            tracing::warn!(
                machine_id = %self.machine_id,
                signal = %notification.signal_name,
                handler = handler.name(),
                error = %error,
                "Signal handler failed"
            );
            metrics::record_handler_failure(&self.machine_id, &notification.signal_name, handler.name());
        }

        DispatchOutcome::Delivered {
            handlers: registration.handlers.len(),
            failures,
        }
    }

    /// Mute `signal` without touching the feed subscription.
    pub fn suspend(&self, signal: &str) -> bool {
        let changed = self.suspended.suspend(signal);
        if changed {
            tracing::info!(machine_id = %self.machine_id, signal, "Signal suspended");
        }
        changed
    }

    /// Unmute `signal`.
    pub fn resume(&self, signal: &str) -> bool {
        let changed = self.suspended.resume(signal);
        if changed {
            tracing::info!(machine_id = %self.machine_id, signal, "Signal resumed");
        }
        changed
    }

    pub fn is_suspended(&self, signal: &str) -> bool {
        self.suspended.contains(signal)
    }

    /// Handle to the shared suspension set.
    pub fn suspension(&self) -> SuspensionSet {
        self.suspended.clone()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
