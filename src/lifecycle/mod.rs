//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Logging/metrics → Build machines → Spawn supervisors
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → supervisors dispose subscriptions → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then machines
//! - Config reloads arrive through the file watcher, not a signal

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
pub use startup::{apply_reload, build_machines, spawn_bus_logger, StartupError};
