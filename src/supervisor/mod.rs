//! Connection supervision subsystem.
//!
//! # Data Flow
//! ```text
//! connect()
//!     Disconnected → Connecting          (claimed atomically)
//!     → Feed::connect
//!     → new session: subscribe + register every SignalBinding
//!     → dispose previous subscription → router.install → apply_changes
//!     → Connected
//!     (any step after Feed::connect fails → dispose, Feed::disconnect)
//!
//! failure / reported drop / watchdog drop:
//!     → Disconnected → timer.rs armed (fixed interval)
//!     → tick: feed up and subscription held? park the timer
//!             otherwise connect() again
//!     → parked and connectivity lost? re-arm
//! ```

pub mod connection;
pub mod state;
pub mod timer;

pub use connection::ConnectionSupervisor;
pub use state::ConnectionState;
pub use timer::ReconnectTimer;
