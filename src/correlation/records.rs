//! Derived records emitted by the correlator.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, Serializer};

use crate::routing::HandlerError;

/// Length of one controller tick in nanoseconds.
pub const TICK_NANOS: i64 = 100;

/// One completed injection cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    pub machine_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "cycle_duration_secs", serialize_with = "serialize_secs")]
    pub cycle_duration: TimeDelta,
    #[serde(rename = "door_open_duration_secs", serialize_with = "serialize_secs")]
    pub door_open_duration: TimeDelta,
    pub mold_id: Option<String>,
    pub configured_cycle_seconds: Option<f64>,
}

/// Raw cycle counter went backwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolloverRecord {
    pub machine_id: String,
    pub timestamp: DateTime<Utc>,
    pub prior_counter_value: i64,
}

/// Convert controller ticks to a duration.
pub fn ticks_to_duration(ticks: i64) -> Result<TimeDelta, HandlerError> {
    if ticks < 0 {
        return Err(HandlerError::OutOfRange(format!("negative tick count {}", ticks)));
    }
    ticks
        .checked_mul(TICK_NANOS)
        .map(TimeDelta::nanoseconds)
        .ok_or_else(|| HandlerError::OutOfRange(format!("tick count {} overflows", ticks)))
}

/// Duration as fractional seconds.
pub fn secs_f64(duration: &TimeDelta) -> f64 {
    match duration.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => duration.num_milliseconds() as f64 / 1e3,
    }
}

fn serialize_secs<S: Serializer>(duration: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(secs_f64(duration))
}
