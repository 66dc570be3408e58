//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use imm_telemetry::config::{MachineConfig, ProfileConfig, ReconnectConfig, KEBA_PROFILE};
use imm_telemetry::correlation::{CycleRecord, RolloverRecord};
use imm_telemetry::feed::MemoryFeed;
use imm_telemetry::sink::{Bus, BusMessage, LogAppender, MetricMessage, MetricSink, SinkError};
use imm_telemetry::MachineRuntime;

pub const CYCLE_NODE: &str = "ns=4;s=APPL.system.sv_CycleTime_KVB";
pub const DOOR_NODE: &str = "ns=4;s=SYS.IO.ONBOARD.DI:40.value";
pub const RAW_NODE: &str = "ns=4;s=APPL.system.sv_ActCycleTime";
pub const MOLD_NODE: &str = "ns=4;s=SYS.IO.ONBOARD.DI:41.value";

/// Bus that keeps every message and can be switched to failing.
#[derive(Default)]
pub struct RecordingBus {
    messages: Mutex<Vec<BusMessage>>,
    failing: AtomicBool,
}

impl RecordingBus {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<BusMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn cycles(&self) -> Vec<CycleRecord> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                BusMessage::Cycle(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn rollovers(&self) -> Vec<RolloverRecord> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                BusMessage::Rollover(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn metrics(&self, signal: &str) -> Vec<MetricMessage> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                BusMessage::Metric(metric) if metric.name == signal => Some(metric),
                _ => None,
            })
            .collect()
    }
}

impl Bus for RecordingBus {
    fn publish(&self, message: BusMessage) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Bus("broker unavailable".into()));
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// Log appender that keeps every line and can be switched to failing.
#[derive(Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingLog {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogAppender for RecordingLog {
    fn append(&self, line: &str) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Io(std::io::Error::other("disk full")));
        }
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// One machine wired to an in-memory feed and recording sinks.
pub struct Harness {
    pub feed: Arc<MemoryFeed>,
    pub bus: Arc<RecordingBus>,
    pub log: Arc<RecordingLog>,
    pub runtime: MachineRuntime,
}

impl Harness {
    pub fn keba() -> Self {
        Self::new(&keba_machine("IMM-01"), &ProfileConfig::keba())
    }

    pub fn new(machine: &MachineConfig, profile: &ProfileConfig) -> Self {
        let feed = Arc::new(MemoryFeed::new(&machine.endpoint));
        let bus = Arc::new(RecordingBus::default());
        let log = Arc::new(RecordingLog::default());
        let sink = Arc::new(MetricSink::new(bus.clone(), log.clone()));
        let runtime = MachineRuntime::build(machine, profile, &ReconnectConfig::default(), feed.clone(), sink);
        Self { feed, bus, log, runtime }
    }

    /// Push a value through the feed; returns how many live subscriptions saw it.
    pub fn send(&self, node: &str, value: imm_telemetry::feed::SignalValue, at: &str) -> usize {
        self.feed.publish(node, value, ts(at))
    }

    /// Drop the connection and let the reconnect timer bring it back.
    pub async fn bounce(&self) {
        let supervisor = self.runtime.supervisor();
        self.feed.set_connected(false);
        supervisor.mark_disconnected("test bounce");
        supervisor.reconnect_tick().await;
    }
}

pub fn keba_machine(id: &str) -> MachineConfig {
    MachineConfig {
        id: id.to_string(),
        endpoint: format!("opc.tcp://{}.plant:4840", id.to_lowercase()),
        profile: KEBA_PROFILE.to_string(),
        mold_id: Some("M-7".to_string()),
        configured_cycle_secs: Some(5.0),
        mold_gate: None,
    }
}

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}
