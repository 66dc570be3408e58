//! Per-machine assembly.
//!
//! A profile's signal table becomes handler chains (`table.rs`); the chains,
//! the correlator, the router and the supervisor of one machine are owned by
//! a [`MachineRuntime`]. Machines share the sink and nothing else.

pub mod runtime;
pub mod table;

pub use runtime::MachineRuntime;
pub use table::build_bindings;
