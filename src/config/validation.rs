//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (machines reference existing profiles and signals)
//! - Validate value ranges (intervals > 0, shift hours in a day)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AcquisitionConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{AcquisitionConfig, HandlerKind, ProfileConfig};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate machine id '{0}'")]
    DuplicateMachine(String),

    #[error("machine '{machine}' references unknown profile '{profile}'")]
    UnknownProfile { machine: String, profile: String },

    #[error("machine '{0}' has an empty endpoint")]
    EmptyEndpoint(String),

    #[error("profile '{profile}' declares signal '{signal}' twice")]
    DuplicateSignal { profile: String, signal: String },

    #[error("profile '{profile}' signal '{signal}' has no handlers")]
    NoHandlers { profile: String, signal: String },

    #[error("profile '{profile}' {field} must be greater than zero")]
    ZeroInterval { profile: String, field: String },

    #[error("machine '{machine}' mold gate names unknown signal '{signal}'")]
    UnknownGateSignal { machine: String, signal: String },

    #[error("machine '{0}' has a mold gate but its profile routes no mold_state signal")]
    GateWithoutMoldState(String),

    #[error("machine '{0}' profile routes mold_state but the machine has no mold gate")]
    MoldStateWithoutGate(String),

    #[error("reconnect {0} must be greater than zero")]
    ZeroReconnect(&'static str),

    #[error("shift_starts must not be empty")]
    NoShifts,

    #[error("shift start {0} is not an hour of the day")]
    ShiftOutOfRange(u32),

    #[error("shift_starts must be strictly increasing")]
    ShiftsNotIncreasing,

    #[error("bus capacity must be greater than zero")]
    ZeroBusCapacity,
}

/// Validate `config`, collecting every problem.
pub fn validate_config(config: &AcquisitionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.reconnect.interval_secs == 0 {
        errors.push(ValidationError::ZeroReconnect("interval_secs"));
    }
    if config.reconnect.watchdog_secs == 0 {
        errors.push(ValidationError::ZeroReconnect("watchdog_secs"));
    }
    if config.bus.capacity == 0 {
        errors.push(ValidationError::ZeroBusCapacity);
    }
    validate_shifts(&config.shift_log.shift_starts, &mut errors);

    for (name, profile) in &config.profiles.0 {
        validate_profile(name, profile, &mut errors);
    }

    let mut seen = HashSet::new();
    for machine in &config.machines {
        if !seen.insert(machine.id.as_str()) {
            errors.push(ValidationError::DuplicateMachine(machine.id.clone()));
        }
        if machine.endpoint.trim().is_empty() {
            errors.push(ValidationError::EmptyEndpoint(machine.id.clone()));
        }

        let Some(profile) = config.profile(&machine.profile) else {
            errors.push(ValidationError::UnknownProfile {
                machine: machine.id.clone(),
                profile: machine.profile.clone(),
            });
            continue;
        };

        let routes_mold_state = profile
            .signals
            .iter()
            .any(|s| s.handlers.contains(&HandlerKind::MoldState));
        match (&machine.mold_gate, routes_mold_state) {
            (Some(gate), true) => {
                if profile.signal(&gate.signal).is_none() {
                    errors.push(ValidationError::UnknownGateSignal {
                        machine: machine.id.clone(),
                        signal: gate.signal.clone(),
                    });
                }
            }
            (Some(_), false) => errors.push(ValidationError::GateWithoutMoldState(machine.id.clone())),
            (None, true) => errors.push(ValidationError::MoldStateWithoutGate(machine.id.clone())),
            (None, false) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_profile(name: &str, profile: &ProfileConfig, errors: &mut Vec<ValidationError>) {
    if profile.publishing_interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval {
            profile: name.to_string(),
            field: "publishing_interval_ms".to_string(),
        });
    }

    let mut names = HashSet::new();
    for signal in &profile.signals {
        if !names.insert(signal.name.as_str()) {
            errors.push(ValidationError::DuplicateSignal {
                profile: name.to_string(),
                signal: signal.name.clone(),
            });
        }
        if signal.handlers.is_empty() {
            errors.push(ValidationError::NoHandlers {
                profile: name.to_string(),
                signal: signal.name.clone(),
            });
        }
        if signal.sampling_interval_ms == 0 {
            errors.push(ValidationError::ZeroInterval {
                profile: name.to_string(),
                field: format!("sampling_interval_ms of '{}'", signal.name),
            });
        }
    }
}

fn validate_shifts(starts: &[u32], errors: &mut Vec<ValidationError>) {
    if starts.is_empty() {
        errors.push(ValidationError::NoShifts);
        return;
    }
    for hour in starts.iter().filter(|h| **h >= 24) {
        errors.push(ValidationError::ShiftOutOfRange(*hour));
    }
    if starts.windows(2).any(|w| w[0] >= w[1]) {
        errors.push(ValidationError::ShiftsNotIncreasing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{MachineConfig, MoldGateConfig, SignalConfig, KEBA_PROFILE};

    fn machine(id: &str) -> MachineConfig {
        MachineConfig {
            id: id.to_string(),
            endpoint: "opc.tcp://10.0.0.21:4840".to_string(),
            profile: KEBA_PROFILE.to_string(),
            mold_id: None,
            configured_cycle_secs: None,
            mold_gate: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let mut config = AcquisitionConfig::default();
        config.machines.push(machine("IMM-01"));
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AcquisitionConfig::default();
        config.machines.push(machine("IMM-01"));
        config.machines.push(machine("IMM-01"));
        let mut orphan = machine("IMM-02");
        orphan.profile = "arburg".to_string();
        config.machines.push(orphan);
        config.shift_log.shift_starts = vec![14, 6, 25];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateMachine("IMM-01".into())));
        assert!(errors.contains(&ValidationError::UnknownProfile {
            machine: "IMM-02".into(),
            profile: "arburg".into(),
        }));
        assert!(errors.contains(&ValidationError::ShiftOutOfRange(25)));
        assert!(errors.contains(&ValidationError::ShiftsNotIncreasing));
    }

    #[test]
    fn test_mold_gate_pairing() {
        let mut config = AcquisitionConfig::default();
        let mut gated = machine("IMM-01");
        gated.mold_gate = Some(MoldGateConfig {
            signal: "RawCycleTime".into(),
        });
        config.machines.push(gated.clone());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::GateWithoutMoldState("IMM-01".into())]);

        let mut profile = config.profile(KEBA_PROFILE).unwrap().clone();
        profile.signals.push(SignalConfig::new(
            "ns=4;s=SYS.IO.ONBOARD.DI:41.value",
            "MoldOpened",
            vec![HandlerKind::MoldState],
        ));
        config.profiles.0.insert("keba-gated".into(), profile);
        config.machines[0].profile = "keba-gated".into();
        assert_eq!(validate_config(&config), Ok(()));

        config.machines[0].mold_gate = None;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MoldStateWithoutGate("IMM-01".into())]);
    }

    #[test]
    fn test_profile_checks() {
        let mut config = AcquisitionConfig::default();
        let mut profile = ProfileConfig::keba();
        profile.publishing_interval_ms = 0;
        profile.signals.push(SignalConfig::new("ns=4;s=X", "CycleTime", vec![]));
        config.profiles.0.insert("broken".into(), profile);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::NoHandlers {
            profile: "broken".into(),
            signal: "CycleTime".into(),
        }));
    }
}
