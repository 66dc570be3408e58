//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! acquisition service. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of the built-in profile for KEBA controllers.
pub const KEBA_PROFILE: &str = "keba";

/// Root configuration for the acquisition service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Reconnect and connectivity polling.
    pub reconnect: ReconnectConfig,

    /// Shift-rotated CSV log.
    pub shift_log: ShiftLogConfig,

    /// In-process message bus.
    pub bus: BusConfig,

    /// Signal tables keyed by machine type.
    pub profiles: Profiles,

    /// Machines to acquire from.
    pub machines: Vec<MachineConfig>,
}

impl AcquisitionConfig {
    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.0.get(name)
    }

    pub fn machine(&self, id: &str) -> Option<&MachineConfig> {
        self.machines.iter().find(|m| m.id == id)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Reconnect configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before retrying a failed connect.
    pub interval_secs: u64,

    /// Connectivity poll period while connected.
    pub watchdog_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            watchdog_secs: 10,
        }
    }
}

/// Shift log configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShiftLogConfig {
    /// Directory receiving the CSV files.
    pub directory: PathBuf,

    /// Local hours at which shifts start.
    pub shift_starts: Vec<u32>,

    /// File name prefix.
    pub file_prefix: String,
}

impl Default for ShiftLogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            shift_starts: vec![6, 14, 22],
            file_prefix: "imm".to_string(),
        }
    }
}

/// Message bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BusConfig {
    /// Broadcast channel capacity.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Named signal tables. Always contains the built-in profiles unless overridden.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Profiles(pub BTreeMap<String, ProfileConfig>);

impl Default for Profiles {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(KEBA_PROFILE.to_string(), ProfileConfig::keba());
        Self(profiles)
    }
}

impl<'de> Deserialize<'de> for Profiles {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let configured = BTreeMap::<String, ProfileConfig>::deserialize(deserializer)?;
        let mut profiles = Profiles::default();
        profiles.0.extend(configured);
        Ok(profiles)
    }
}

/// Signal table for one machine type.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProfileConfig {
    /// Publishing interval of the feed subscription.
    #[serde(default = "default_publishing_interval")]
    pub publishing_interval_ms: u64,

    /// Monitored signals.
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
}

fn default_publishing_interval() -> u64 {
    1000
}

impl ProfileConfig {
    /// KEBA KePlast controller table.
    pub fn keba() -> Self {
        Self {
            publishing_interval_ms: default_publishing_interval(),
            signals: vec![
                SignalConfig::new(
                    "ns=4;s=APPL.system.sv_CycleTime_KVB",
                    "CycleTime",
                    vec![HandlerKind::Publish, HandlerKind::CycleComplete],
                ),
                SignalConfig::new(
                    "ns=4;s=SYS.IO.ONBOARD.DI:40.value",
                    "DoorOpened",
                    vec![HandlerKind::Publish, HandlerKind::Door],
                ),
                SignalConfig::new(
                    "ns=4;s=APPL.system.sv_ActCycleTime",
                    "RawCycleTime",
                    vec![HandlerKind::RawCycleElapsed],
                ),
            ],
        }
    }

    pub fn signal(&self, name: &str) -> Option<&SignalConfig> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// One monitored signal.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SignalConfig {
    /// Controller node address.
    pub node: String,

    /// Signal name used for routing and output.
    pub name: String,

    /// Sampling interval requested from the feed.
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval_ms: u64,

    /// Handlers, run in this order.
    pub handlers: Vec<HandlerKind>,
}

fn default_sampling_interval() -> u64 {
    1000
}

impl SignalConfig {
    pub fn new(node: impl Into<String>, name: impl Into<String>, handlers: Vec<HandlerKind>) -> Self {
        Self {
            node: node.into(),
            name: name.into(),
            sampling_interval_ms: default_sampling_interval(),
            handlers,
        }
    }
}

/// Handler attached to a signal.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Publish,
    Door,
    CycleComplete,
    RawCycleElapsed,
    MoldState,
}

/// One physical machine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MachineConfig {
    /// Unique machine identifier.
    pub id: String,

    /// Feed endpoint (e.g., "opc.tcp://10.0.0.21:4840").
    pub endpoint: String,

    /// Profile name.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Mounted mold, set by the operator.
    #[serde(default)]
    pub mold_id: Option<String>,

    /// Expected cycle time in seconds.
    #[serde(default)]
    pub configured_cycle_secs: Option<f64>,

    /// Optional mold-state gate on the raw counter.
    #[serde(default)]
    pub mold_gate: Option<MoldGateConfig>,
}

fn default_profile() -> String {
    KEBA_PROFILE.to_string()
}

/// Mold-state gate settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MoldGateConfig {
    /// Signal suspended after a rollover until the mold opens.
    pub signal: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.reconnect.interval_secs, 10);
        assert_eq!(config.shift_log.shift_starts, vec![6, 14, 22]);
        assert!(config.profile(KEBA_PROFILE).is_some());
        assert!(config.machines.is_empty());
    }

    #[test]
    fn test_custom_profile_keeps_builtin() {
        let config: AcquisitionConfig = toml::from_str(
            r#"
            [profiles.engel]
            publishing_interval_ms = 500

            [[profiles.engel.signals]]
            node = "ns=2;s=Door"
            name = "DoorOpened"
            handlers = ["publish", "door"]

            [[machines]]
            id = "IMM-02"
            endpoint = "opc.tcp://10.0.0.22:4840"
            profile = "engel"
            "#,
        )
        .unwrap();

        assert!(config.profile(KEBA_PROFILE).is_some());
        let engel = config.profile("engel").unwrap();
        assert_eq!(engel.publishing_interval_ms, 500);
        assert_eq!(engel.signals[0].handlers, vec![HandlerKind::Publish, HandlerKind::Door]);
        assert_eq!(engel.signals[0].sampling_interval_ms, 1000);
        assert_eq!(config.machine("IMM-02").unwrap().profile, "engel");
    }

    #[test]
    fn test_machine_defaults_to_keba() {
        let config: AcquisitionConfig = toml::from_str(
            r#"
            [[machines]]
            id = "IMM-01"
            endpoint = "opc.tcp://10.0.0.21:4840"
            mold_id = "M-7"
            "#,
        )
        .unwrap();
        let machine = config.machine("IMM-01").unwrap();
        assert_eq!(machine.profile, KEBA_PROFILE);
        assert_eq!(machine.mold_id.as_deref(), Some("M-7"));
        assert!(machine.mold_gate.is_none());
    }
}
