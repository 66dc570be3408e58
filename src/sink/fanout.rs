//! Metric fan-out to bus and log.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::correlation::{secs_f64, CycleRecord, RolloverRecord};
use crate::feed::{SignalNotification, SignalValue};
use crate::observability::metrics;
use crate::routing::{HandlerError, SignalHandler};
use crate::sink::bus::{Bus, BusMessage, MetricMessage};
use crate::sink::log::{format_line, LogAppender};
use crate::sink::SinkError;

/// Log name of a cycle's duration line.
pub const CYCLE_DURATION: &str = "CycleDuration";
/// Log name of a cycle's door-open line.
pub const DOOR_OPEN_DURATION: &str = "DoorOpenDuration";
/// Log name of a rollover line.
pub const COUNTER_ROLLOVER: &str = "CycleCounterRollover";

/// Publishes every metric to the bus and the durable log.
///
/// Both side effects are always attempted; a failure in one never skips the other.
pub struct MetricSink {
    bus: Arc<dyn Bus>,
    log: Arc<dyn LogAppender>,
}

impl MetricSink {
    pub fn new(bus: Arc<dyn Bus>, log: Arc<dyn LogAppender>) -> Self {
        Self { bus, log }
    }

    /// Forward one raw metric value.
    pub fn publish(
        &self,
        machine_id: &str,
        signal_name: &str,
        value: SignalValue,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SinkError> {
        let bus = self.bus.publish(BusMessage::Metric(MetricMessage {
            machine_id: machine_id.to_string(),
            name: signal_name.to_string(),
            value,
            timestamp,
        }));
        let log = self
            .log
            .append(&format_line(machine_id, signal_name, &value.to_string(), timestamp));
        settle(bus, log)
    }

    /// Forward a completed cycle.
    pub fn publish_cycle(&self, record: &CycleRecord) -> Result<(), SinkError> {
        let bus = self.bus.publish(BusMessage::Cycle(record.clone()));
        let cycle_line = format_line(
            &record.machine_id,
            CYCLE_DURATION,
            &format!("{:.3}", secs_f64(&record.cycle_duration)),
            record.timestamp,
        );
        let door_line = format_line(
            &record.machine_id,
            DOOR_OPEN_DURATION,
            &format!("{:.3}", secs_f64(&record.door_open_duration)),
            record.timestamp,
        );
        let log = self.log.append(&cycle_line).and(self.log.append(&door_line));
        settle(bus, log)
    }

    /// Forward a counter rollover.
    pub fn publish_rollover(&self, record: &RolloverRecord) -> Result<(), SinkError> {
        let bus = self.bus.publish(BusMessage::Rollover(record.clone()));
        let log = self.log.append(&format_line(
            &record.machine_id,
            COUNTER_ROLLOVER,
            &record.prior_counter_value.to_string(),
            record.timestamp,
        ));
        settle(bus, log)
    }
}

fn settle(bus: Result<(), SinkError>, log: Result<(), SinkError>) -> Result<(), SinkError> {
    if let Err(e) = &bus {
        tracing::warn!(sink = "bus", error = %e, "Bus publish failed");
        metrics::record_sink_failure("bus");
    }
    if let Err(e) = &log {
        tracing::warn!(sink = "log", error = %e, "Log append failed");
        metrics::record_sink_failure("log");
    }
    bus.and(log)
}

/// Handler that forwards every routed raw value to the sink.
pub struct PublishHandler {
    machine_id: String,
    sink: Arc<MetricSink>,
}

impl PublishHandler {
    pub fn new(machine_id: impl Into<String>, sink: Arc<MetricSink>) -> Self {
        Self {
            machine_id: machine_id.into(),
            sink,
        }
    }
}

impl SignalHandler for PublishHandler {
    fn name(&self) -> &str {
        "publish"
    }

    fn handle(&self, notification: &SignalNotification) -> Result<(), HandlerError> {
        self.sink.publish(
            &self.machine_id,
            &notification.signal_name,
            notification.value,
            notification.source_timestamp,
        )?;
        Ok(())
    }
}
