//! Cycle correlator.
//!
//! Turns interleaved door, cycle-complete and raw-counter samples into cycle
//! and rollover records. State is held behind one mutex per machine so
//! concurrent feed callbacks are serialized; records are emitted after the
//! lock is released.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::correlation::records::{ticks_to_duration, CycleRecord, RolloverRecord};
use crate::correlation::state::MachineState;
use crate::feed::SignalValue;
use crate::observability::metrics;
use crate::routing::{HandlerError, SuspensionSet};
use crate::sink::MetricSink;

/// Optional mold-state gate on the raw counter signal.
#[derive(Debug, Clone)]
pub struct MoldGate {
    signal: String,
    suspension: SuspensionSet,
}

impl MoldGate {
    pub fn new(signal: impl Into<String>, suspension: SuspensionSet) -> Self {
        Self {
            signal: signal.into(),
            suspension,
        }
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }
}

pub struct CycleCorrelator {
    machine_id: String,
    state: Mutex<MachineState>,
    sink: Arc<MetricSink>,
    gate: Option<MoldGate>,
}

impl CycleCorrelator {
    pub fn new(state: MachineState, sink: Arc<MetricSink>) -> Self {
        Self {
            machine_id: state.machine_id().to_string(),
            state: Mutex::new(state),
            sink,
            gate: None,
        }
    }

    /// Suspend the gated signal on rollover until the mold opens again.
    pub fn with_mold_gate(mut self, gate: MoldGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn mold_gate(&self) -> Option<&MoldGate> {
        self.gate.as_ref()
    }

    pub fn set_mold_id(&self, mold_id: Option<String>) {
        self.lock().set_mold_id(mold_id);
    }

    pub fn set_configured_cycle_seconds(&self, seconds: Option<f64>) {
        self.lock().set_configured_cycle_seconds(seconds);
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> MachineState {
        self.lock().clone()
    }

    /// Door bit: non-zero marks the open edge, zero the close edge.
    pub fn on_door(&self, value: SignalValue, timestamp: DateTime<Utc>) -> Result<(), HandlerError> {
        let open = value.as_bit()?;
        let mut state = self.lock();
        if open {
            state.mark_door_open(timestamp);
        } else {
            state.mark_door_closed(timestamp);
        }
        Ok(())
    }

    /// Completed cycle time in ticks; emits one cycle record.
    pub fn on_cycle_complete(
        &self,
        value: SignalValue,
        timestamp: DateTime<Utc>,
    ) -> Result<CycleRecord, HandlerError> {
        let cycle_duration = ticks_to_duration(value.as_ticks()?)?;
        let record = {
            let state = self.lock();
            CycleRecord {
                machine_id: self.machine_id.clone(),
                timestamp,
                cycle_duration,
                door_open_duration: state.door_open_duration(),
                mold_id: state.mold_id().map(str::to_string),
                configured_cycle_seconds: state.configured_cycle_seconds(),
            }
        };

        tracing::debug!(
            machine_id = %self.machine_id,
            cycle_ms = record.cycle_duration.num_milliseconds(),
            door_open_ms = record.door_open_duration.num_milliseconds(),
            "Cycle completed"
        );
        metrics::record_cycle(&self.machine_id);
        self.sink.publish_cycle(&record)?;
        Ok(record)
    }

    /// In-progress counter; emits a rollover record when it goes backwards.
    pub fn on_raw_cycle_elapsed(
        &self,
        value: SignalValue,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<RolloverRecord>, HandlerError> {
        let counter = value.as_ticks()?;
        let prior = self.lock().swap_raw_counter(counter);

        let prior = match prior {
            Some(prior) if counter < prior => prior,
            _ => return Ok(None),
        };

        let record = RolloverRecord {
            machine_id: self.machine_id.clone(),
            timestamp,
            prior_counter_value: prior,
        };
        tracing::info!(
            machine_id = %self.machine_id,
            prior,
            current = counter,
            "Cycle counter rollover"
        );
        metrics::record_rollover(&self.machine_id);

        if let Some(gate) = &self.gate {
            if gate.suspension.suspend(&gate.signal) {
                tracing::info!(machine_id = %self.machine_id, signal = %gate.signal, "Suspended until mold opens");
            }
        }

        self.sink.publish_rollover(&record)?;
        Ok(Some(record))
    }

    /// Mold bit: an open edge lifts the gate's suspension.
    pub fn on_mold_state(&self, value: SignalValue, _timestamp: DateTime<Utc>) -> Result<(), HandlerError> {
        let open = value.as_bit()?;
        if let (true, Some(gate)) = (open, &self.gate) {
            if gate.suspension.resume(&gate.signal) {
                tracing::info!(machine_id = %self.machine_id, signal = %gate.signal, "Mold opened, resumed");
            }
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
