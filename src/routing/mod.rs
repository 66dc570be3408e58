//! Signal routing subsystem.
//!
//! # Data Flow
//! ```text
//! Feed callback (item, value, source_timestamp)
//!     → router.rs: session check, item → signal name
//!     → suspension.rs: muted? drop silently
//!     → handler.rs: run chain in registration order
//!
//! Session install (on every successful connect):
//!     SignalBinding[]  (machine signal table)
//!     → registration.rs: RegistrationSet::register per binding
//!     → router.rs: atomic swap of the whole set
//! ```
//!
//! # Design Decisions
//! - One live registration set per machine, never merged with the previous one
//! - Suspension gates emission only; sampling continues in the feed
//! - No ordering guarantee across different signals

pub mod handler;
pub mod registration;
pub mod router;
pub mod suspension;

pub use handler::{handler_fn, HandlerChain, HandlerError, SignalHandler};
pub use registration::{Registration, RegistrationSet, SignalBinding};
pub use router::{DispatchOutcome, SignalRouter};
pub use suspension::SuspensionSet;
