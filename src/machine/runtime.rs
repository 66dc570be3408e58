//! One running machine: correlator, router and supervisor wired together.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{MachineConfig, ProfileConfig, ReconnectConfig};
use crate::correlation::{CycleCorrelator, MachineState, MoldGate};
use crate::feed::Feed;
use crate::machine::table::build_bindings;
use crate::routing::{SignalRouter, SuspensionSet};
use crate::sink::MetricSink;
use crate::supervisor::{ConnectionState, ConnectionSupervisor};

pub struct MachineRuntime {
    id: String,
    correlator: Arc<CycleCorrelator>,
    router: Arc<SignalRouter>,
    supervisor: Arc<ConnectionSupervisor>,
}

impl MachineRuntime {
    /// Assemble a machine. Nothing connects until [`connect`](Self::connect) or [`spawn`](Self::spawn).
    pub fn build(
        machine: &MachineConfig,
        profile: &ProfileConfig,
        reconnect: &ReconnectConfig,
        feed: Arc<dyn Feed>,
        sink: Arc<MetricSink>,
    ) -> Self {
        let suspension = SuspensionSet::new();

        let mut state = MachineState::new(&machine.id);
        state.set_mold_id(machine.mold_id.clone());
        state.set_configured_cycle_seconds(machine.configured_cycle_secs);

        let mut correlator = CycleCorrelator::new(state, Arc::clone(&sink));
        if let Some(gate) = &machine.mold_gate {
            correlator = correlator.with_mold_gate(MoldGate::new(&gate.signal, suspension.clone()));
        }
        let correlator = Arc::new(correlator);

        let router = Arc::new(SignalRouter::new(&machine.id, suspension));
        let bindings = build_bindings(profile, &machine.id, &correlator, &sink);
        let supervisor = Arc::new(ConnectionSupervisor::new(
            feed,
            Arc::clone(&router),
            bindings,
            profile.publishing_interval_ms,
            reconnect,
        ));

        Self {
            id: machine.id.clone(),
            correlator,
            router,
            supervisor,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn correlator(&self) -> &Arc<CycleCorrelator> {
        &self.correlator
    }

    pub fn router(&self) -> &Arc<SignalRouter> {
        &self.router
    }

    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn set_mold_id(&self, mold_id: Option<String>) {
        self.correlator.set_mold_id(mold_id);
    }

    pub fn set_configured_cycle_seconds(&self, seconds: Option<f64>) {
        self.correlator.set_configured_cycle_seconds(seconds);
    }

    /// Apply the runtime-mutable settings of `machine`. Returns true if anything changed.
    pub fn apply_settings(&self, machine: &MachineConfig) -> bool {
        let current = self.correlator.snapshot();
        let mut changed = false;

        if current.mold_id() != machine.mold_id.as_deref() {
            self.set_mold_id(machine.mold_id.clone());
            changed = true;
        }
        if current.configured_cycle_seconds() != machine.configured_cycle_secs {
            self.set_configured_cycle_seconds(machine.configured_cycle_secs);
            changed = true;
        }

        if changed {
            tracing::info!(
                machine_id = %self.id,
                mold_id = ?machine.mold_id,
                configured_cycle_secs = ?machine.configured_cycle_secs,
                "Machine settings updated"
            );
        }
        changed
    }

    pub async fn connect(&self) {
        self.supervisor.connect().await;
    }

    /// Connect, then supervise until shutdown.
    pub fn spawn(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let supervisor = Arc::clone(&self.supervisor);
        tokio::spawn(async move {
            supervisor.connect().await;
            supervisor.run(shutdown).await;
        })
    }
}
