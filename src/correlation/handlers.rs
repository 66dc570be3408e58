//! Signal handlers backed by the correlator.

use std::sync::Arc;

use crate::correlation::correlator::CycleCorrelator;
use crate::feed::SignalNotification;
use crate::routing::{HandlerError, SignalHandler};

/// Which correlator input a signal feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelatorInput {
    Door,
    CycleComplete,
    RawCycleElapsed,
    MoldState,
}

impl CorrelatorInput {
    pub fn name(self) -> &'static str {
        match self {
            CorrelatorInput::Door => "door",
            CorrelatorInput::CycleComplete => "cycle_complete",
            CorrelatorInput::RawCycleElapsed => "raw_cycle_elapsed",
            CorrelatorInput::MoldState => "mold_state",
        }
    }
}

pub struct CorrelatorHandler {
    input: CorrelatorInput,
    correlator: Arc<CycleCorrelator>,
}

impl CorrelatorHandler {
    pub fn new(input: CorrelatorInput, correlator: Arc<CycleCorrelator>) -> Self {
        Self { input, correlator }
    }

    pub fn shared(input: CorrelatorInput, correlator: Arc<CycleCorrelator>) -> Arc<dyn SignalHandler> {
        Arc::new(Self::new(input, correlator))
    }
}

impl SignalHandler for CorrelatorHandler {
    fn name(&self) -> &str {
        self.input.name()
    }

    fn handle(&self, notification: &SignalNotification) -> Result<(), HandlerError> {
        let value = notification.value;
        let at = notification.source_timestamp;
        match self.input {
            CorrelatorInput::Door => self.correlator.on_door(value, at),
            CorrelatorInput::CycleComplete => self.correlator.on_cycle_complete(value, at).map(|_| ()),
            CorrelatorInput::RawCycleElapsed => self.correlator.on_raw_cycle_elapsed(value, at).map(|_| ()),
            CorrelatorInput::MoldState => self.correlator.on_mold_state(value, at),
        }
    }
}
