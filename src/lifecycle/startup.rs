//! Startup orchestration.
//!
//! # Responsibilities
//! - Build one machine runtime per configured machine
//! - Log bus traffic for operators until shutdown
//! - Apply hot-reloaded operator settings to running machines
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Reloads never restart a machine; structural changes are reported only

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::config::{AcquisitionConfig, ConfigError, MachineConfig};
use crate::feed::Feed;
use crate::machine::MachineRuntime;
use crate::sink::{BroadcastBus, MetricSink};

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("machine '{machine}' references unknown profile '{profile}'")]
    UnknownProfile { machine: String, profile: String },

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("config watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    Unsupported(String),
}

/// Build every configured machine, obtaining its feed from `feed_for`.
pub fn build_machines<F>(
    config: &AcquisitionConfig,
    sink: &Arc<MetricSink>,
    mut feed_for: F,
) -> Result<Vec<MachineRuntime>, StartupError>
where
    F: FnMut(&MachineConfig) -> Arc<dyn Feed>,
{
    config
        .machines
        .iter()
        .map(|machine| {
            let profile = config
                .profile(&machine.profile)
                .ok_or_else(|| StartupError::UnknownProfile {
                    machine: machine.id.clone(),
                    profile: machine.profile.clone(),
                })?;
            tracing::info!(
                machine_id = %machine.id,
                endpoint = %machine.endpoint,
                profile = %machine.profile,
                signals = profile.signals.len(),
                "Machine configured"
            );
            Ok(MachineRuntime::build(
                machine,
                profile,
                &config.reconnect,
                feed_for(machine),
                Arc::clone(sink),
            ))
        })
        .collect()
}

/// Apply a reloaded configuration. Returns the number of machines whose settings changed.
pub fn apply_reload(machines: &[MachineRuntime], current: &AcquisitionConfig, next: &AcquisitionConfig) -> usize {
    if current.observability != next.observability
        || current.reconnect != next.reconnect
        || current.shift_log != next.shift_log
        || current.bus != next.bus
        || current.profiles != next.profiles
    {
        tracing::warn!("Service-level configuration changed; restart required to apply it");
    }

    for removed in current.machines.iter().filter(|m| next.machine(&m.id).is_none()) {
        tracing::warn!(machine_id = %removed.id, "Machine removed from config; restart required");
    }

    let mut updated = 0;
    for machine in &next.machines {
        let Some(runtime) = machines.iter().find(|r| r.id() == machine.id) else {
            tracing::warn!(machine_id = %machine.id, "New machine in config; restart required");
            continue;
        };

        if let Some(previous) = current.machine(&machine.id) {
            if previous.endpoint != machine.endpoint
                || previous.profile != machine.profile
                || previous.mold_gate != machine.mold_gate
            {
                tracing::warn!(machine_id = %machine.id, "Feed settings changed; restart required");
            }
        }

        if runtime.apply_settings(machine) {
            updated += 1;
        }
    }
    updated
}

/// Log every bus message at debug level until shutdown.
pub fn spawn_bus_logger(bus: &BroadcastBus, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                message = rx.recv() => match message {
                    Ok(message) => match serde_json::to_string(message.as_ref()) {
                        Ok(json) => tracing::debug!(machine_id = %message.machine_id(), message = %json, "Bus message"),
                        Err(e) => tracing::warn!(error = %e, "Failed to encode bus message"),
                    },
                    Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Bus logger lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}
