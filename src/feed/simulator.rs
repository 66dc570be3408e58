//! Synthetic machine cycles for a [`MemoryFeed`].
//!
//! Each cycle opens the door (and mold), closes it, samples the in-progress
//! counter once per second and finishes with a cycle-complete value. The raw
//! counter restarts every cycle, so downstream rollover detection fires once
//! per cycle.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::{HandlerKind, ProfileConfig};
use crate::feed::memory::MemoryFeed;
use crate::feed::types::SignalValue;
use crate::feed::Feed;

const TICKS_PER_SEC: i64 = 10_000_000;

/// Node addresses the simulator writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatorNodes {
    pub door: Option<String>,
    pub mold: Option<String>,
    pub cycle_complete: Option<String>,
    pub raw_cycle: Option<String>,
}

impl SimulatorNodes {
    /// First node of the profile routed to each correlator input.
    pub fn from_profile(profile: &ProfileConfig) -> Self {
        let find = |kind: HandlerKind| {
            profile
                .signals
                .iter()
                .find(|s| s.handlers.contains(&kind))
                .map(|s| s.node.clone())
        };
        Self {
            door: find(HandlerKind::Door),
            mold: find(HandlerKind::MoldState),
            cycle_complete: find(HandlerKind::CycleComplete),
            raw_cycle: find(HandlerKind::RawCycleElapsed),
        }
    }
}

pub struct CycleSimulator {
    feed: Arc<MemoryFeed>,
    nodes: SimulatorNodes,
    cycle: Duration,
    door_open: Duration,
}

impl CycleSimulator {
    pub fn new(feed: Arc<MemoryFeed>, nodes: SimulatorNodes, cycle: Duration, door_open: Duration) -> Self {
        Self {
            feed,
            nodes,
            cycle,
            door_open: door_open.min(cycle),
        }
    }

    /// Generate cycles until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(endpoint = %self.feed.endpoint(), cycle_secs = self.cycle.as_secs_f64(), "Simulator started");
        while self.run_cycle(&mut shutdown).await {}
        tracing::info!(endpoint = %self.feed.endpoint(), "Simulator stopped");
    }

    /// One full cycle. Returns false once shutdown was requested.
    async fn run_cycle(&self, shutdown: &mut broadcast::Receiver<()>) -> bool {
        self.set(&self.nodes.door, SignalValue::Byte(1));
        self.set(&self.nodes.mold, SignalValue::Byte(1));
        if !pause(self.door_open, shutdown).await {
            return false;
        }

        self.set(&self.nodes.door, SignalValue::Byte(0));
        self.set(&self.nodes.mold, SignalValue::Byte(0));

        let closed = self.cycle.saturating_sub(self.door_open);
        let mut elapsed = Duration::ZERO;
        while elapsed + Duration::from_secs(1) < closed {
            elapsed += Duration::from_secs(1);
            if !pause(Duration::from_secs(1), shutdown).await {
                return false;
            }
            self.set(&self.nodes.raw_cycle, SignalValue::Integer(to_ticks(elapsed)));
        }
        if !pause(closed.saturating_sub(elapsed), shutdown).await {
            return false;
        }

        self.set(&self.nodes.cycle_complete, SignalValue::Integer(to_ticks(self.cycle)));
        true
    }

    fn set(&self, node: &Option<String>, value: SignalValue) {
        if let Some(node) = node {
            self.feed.publish(node, value, Utc::now());
        }
    }
}

fn to_ticks(duration: Duration) -> i64 {
    duration.as_secs() as i64 * TICKS_PER_SEC + i64::from(duration.subsec_nanos()) / 100
}

async fn pause(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = shutdown.recv() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
