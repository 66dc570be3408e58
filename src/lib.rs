//! Injection-molding machine telemetry acquisition library.

pub mod config;
pub mod correlation;
pub mod feed;
pub mod lifecycle;
pub mod machine;
pub mod observability;
pub mod routing;
pub mod sink;
pub mod supervisor;

pub use config::schema::AcquisitionConfig;
pub use lifecycle::Shutdown;
pub use machine::MachineRuntime;
