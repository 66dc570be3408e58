//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! supervisor / router / correlator / sink produce:
//!     → logging.rs (structured log events, machine_id + session fields)
//!     → metrics.rs (counters and the connection-state gauge)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric updates are fire-and-forget; no recorder means no cost beyond a branch
//! - Logging is initialised once, before any machine starts

pub mod logging;
pub mod metrics;
