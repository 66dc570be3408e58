//! Cycle correlation subsystem.
//!
//! # Data Flow
//! ```text
//! routed notification
//!     → handlers.rs (door | cycle_complete | raw_cycle_elapsed | mold_state)
//!     → correlator.rs: update MachineState under the machine lock
//!     → records.rs: CycleRecord / RolloverRecord
//!     → MetricSink
//! ```
//!
//! # Design Decisions
//! - Door + cycle-complete produce the authoritative cycle record
//! - The raw counter only detects rollovers; it never drives a cycle record
//! - Missing or out-of-order door events yield stale durations, not errors
//! - Mold gating of the raw counter is opt-in per machine

pub mod correlator;
pub mod handlers;
pub mod records;
pub mod state;

pub use correlator::{CycleCorrelator, MoldGate};
pub use handlers::{CorrelatorHandler, CorrelatorInput};
pub use records::{secs_f64, ticks_to_duration, CycleRecord, RolloverRecord, TICK_NANOS};
pub use state::MachineState;
