//! One-shot reconnect timer.
//!
//! Arming sets a deadline one interval from now; disarming clears it. The
//! supervisor loop sleeps until the deadline and is woken through
//! [`ReconnectTimer::changed`] whenever the deadline moves.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ReconnectTimer {
    interval: Duration,
    deadline: Mutex<Option<Instant>>,
    notify: Notify,
}

impl ReconnectTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fire once, one interval from now.
    pub fn arm(&self) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now() + self.interval);
        self.notify.notify_one();
    }

    pub fn disarm(&self) {
        let was_armed = self
            .deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if was_armed {
            self.notify.notify_one();
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_armed(&self) -> bool {
        self.deadline().is_some()
    }

    /// Resolves after the next arm or disarm.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_arm_sets_deadline() {
        let timer = ReconnectTimer::new(Duration::from_secs(10));
        assert!(!timer.is_armed());

        let before = Instant::now();
        timer.arm();
        assert_eq!(timer.deadline(), Some(before + Duration::from_secs(10)));

        timer.disarm();
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_wakes_on_arm() {
        let timer = std::sync::Arc::new(ReconnectTimer::new(Duration::from_secs(10)));
        let waiter = {
            let timer = timer.clone();
            tokio::spawn(async move { timer.changed().await })
        };
        tokio::task::yield_now().await;
        timer.arm();
        waiter.await.unwrap();
    }
}
