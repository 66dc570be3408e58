//! Message bus capability.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::correlation::{CycleRecord, RolloverRecord};
use crate::feed::SignalValue;
use crate::sink::SinkError;

/// Raw metric forwarded as sampled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMessage {
    pub machine_id: String,
    pub name: String,
    pub value: SignalValue,
    pub timestamp: DateTime<Utc>,
}

/// Typed message published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    Metric(MetricMessage),
    Cycle(CycleRecord),
    Rollover(RolloverRecord),
}

impl BusMessage {
    /// Machine the message belongs to.
    pub fn machine_id(&self) -> &str {
        match self {
            BusMessage::Metric(m) => &m.machine_id,
            BusMessage::Cycle(c) => &c.machine_id,
            BusMessage::Rollover(r) => &r.machine_id,
        }
    }
}

/// Fire-and-forget publisher.
pub trait Bus: Send + Sync {
    fn publish(&self, message: BusMessage) -> Result<(), SinkError>;
}

/// In-process bus over a tokio broadcast channel.
///
/// Downstream consumers call [`BroadcastBus::subscribe`]; slow consumers lag
/// and lose the oldest messages rather than blocking publishers.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<Arc<BusMessage>>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BusMessage>> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Bus for BroadcastBus {
    fn publish(&self, message: BusMessage) -> Result<(), SinkError> {
        if self.tx.send(Arc::new(message)).is_err() {
            // Nobody listening is not a delivery failure for a broadcast bus.
            tracing::trace!("Bus message published without subscribers");
        }
        Ok(())
    }
}
