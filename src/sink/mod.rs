//! Metric sink subsystem.
//!
//! # Data Flow
//! ```text
//! publish handler / correlator
//!     → fanout.rs (MetricSink)
//!         ├─→ bus.rs (typed BusMessage, fire-and-forget)
//!         └─→ log.rs (CSV line in the current shift file)
//! ```
//!
//! # Design Decisions
//! - Stateless; safe to share one sink across machines
//! - Bus and log are independent: one failing never skips the other
//! - Failures are returned to the caller and counted, never retried here

pub mod bus;
pub mod fanout;
pub mod log;

use thiserror::Error;

pub use bus::{BroadcastBus, Bus, BusMessage, MetricMessage};
pub use fanout::{MetricSink, PublishHandler};
pub use log::{format_line, LogAppender, ShiftLogAppender, ShiftSchedule, LOG_HEADER};

/// Errors raised by sink collaborators.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The bus rejected the message.
    #[error("bus error: {0}")]
    Bus(String),

    /// Writing the durable log failed.
    #[error("log write failed: {0}")]
    Io(#[from] std::io::Error),
}
