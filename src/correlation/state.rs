//! Per-machine correlation state.

use chrono::{DateTime, TimeDelta, Utc};

/// Everything the correlator remembers about one machine.
///
/// Door timestamps and the raw counter only change through the correlator's
/// own handlers. Mold and cycle settings come from the operator and survive
/// reconnects.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    machine_id: String,
    mold_id: Option<String>,
    configured_cycle_seconds: Option<f64>,
    door_open_time: Option<DateTime<Utc>>,
    door_close_time: Option<DateTime<Utc>>,
    last_raw_cycle_counter: Option<i64>,
}

impl MachineState {
    pub fn new(machine_id: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            mold_id: None,
            configured_cycle_seconds: None,
            door_open_time: None,
            door_close_time: None,
            last_raw_cycle_counter: None,
        }
    }

    pub fn with_mold_id(mut self, mold_id: impl Into<String>) -> Self {
        self.mold_id = Some(mold_id.into());
        self
    }

    pub fn with_configured_cycle_seconds(mut self, seconds: f64) -> Self {
        self.configured_cycle_seconds = Some(seconds);
        self
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn mold_id(&self) -> Option<&str> {
        self.mold_id.as_deref()
    }

    pub fn configured_cycle_seconds(&self) -> Option<f64> {
        self.configured_cycle_seconds
    }

    pub fn door_open_time(&self) -> Option<DateTime<Utc>> {
        self.door_open_time
    }

    pub fn door_close_time(&self) -> Option<DateTime<Utc>> {
        self.door_close_time
    }

    pub fn last_raw_cycle_counter(&self) -> Option<i64> {
        self.last_raw_cycle_counter
    }

    pub fn set_mold_id(&mut self, mold_id: Option<String>) {
        self.mold_id = mold_id;
    }

    pub fn set_configured_cycle_seconds(&mut self, seconds: Option<f64>) {
        self.configured_cycle_seconds = seconds;
    }

    /// Close minus open using whatever timestamps are held; zero until both are seen.
    ///
    /// May be stale or negative when a door event was missed.
    pub fn door_open_duration(&self) -> TimeDelta {
        match (self.door_open_time, self.door_close_time) {
            (Some(open), Some(close)) => close - open,
            _ => TimeDelta::zero(),
        }
    }

    pub(super) fn mark_door_open(&mut self, at: DateTime<Utc>) {
        self.door_open_time = Some(at);
    }

    pub(super) fn mark_door_closed(&mut self, at: DateTime<Utc>) {
        self.door_close_time = Some(at);
    }

    /// Store the latest raw counter and return the previous one.
    pub(super) fn swap_raw_counter(&mut self, value: i64) -> Option<i64> {
        self.last_raw_cycle_counter.replace(value)
    }
}
