//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AcquisitionConfig (validated, immutable)
//!     → one MachineRuntime per [[machines]] entry
//!
//! On file change:
//!     watcher.rs detects a change to the file (identical content is skipped)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → lifecycle applies mold_id / configured_cycle_secs to running machines
//! ```
//!
//! # Design Decisions
//! - Only operator settings are hot-reloadable; feed and signal table changes need a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AcquisitionConfig, BusConfig, HandlerKind, LogFormat, MachineConfig, MoldGateConfig, ObservabilityConfig,
    ProfileConfig, Profiles, ReconnectConfig, ShiftLogConfig, SignalConfig, KEBA_PROFILE,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
