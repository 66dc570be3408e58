//! Signal table → handler chains.

use std::sync::Arc;

use crate::config::{HandlerKind, ProfileConfig};
use crate::correlation::{CorrelatorHandler, CorrelatorInput, CycleCorrelator};
use crate::routing::{HandlerChain, SignalBinding, SignalHandler};
use crate::sink::{MetricSink, PublishHandler};

/// Build the bindings of one machine from its profile.
pub fn build_bindings(
    profile: &ProfileConfig,
    machine_id: &str,
    correlator: &Arc<CycleCorrelator>,
    sink: &Arc<MetricSink>,
) -> Vec<SignalBinding> {
    profile
        .signals
        .iter()
        .map(|signal| {
            let handlers: HandlerChain = signal
                .handlers
                .iter()
                .map(|kind| handler_for(*kind, machine_id, correlator, sink))
                .collect();
            SignalBinding::new(&signal.node, &signal.name, signal.sampling_interval_ms, handlers)
        })
        .collect()
}

fn handler_for(
    kind: HandlerKind,
    machine_id: &str,
    correlator: &Arc<CycleCorrelator>,
    sink: &Arc<MetricSink>,
) -> Arc<dyn SignalHandler> {
    let input = match kind {
        HandlerKind::Publish => return Arc::new(PublishHandler::new(machine_id, Arc::clone(sink))),
        HandlerKind::Door => CorrelatorInput::Door,
        HandlerKind::CycleComplete => CorrelatorInput::CycleComplete,
        HandlerKind::RawCycleElapsed => CorrelatorInput::RawCycleElapsed,
        HandlerKind::MoldState => CorrelatorInput::MoldState,
    };
    CorrelatorHandler::shared(input, Arc::clone(correlator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::MachineState;
    use crate::sink::{BroadcastBus, LogAppender, SinkError};

    struct NullLog;

    impl LogAppender for NullLog {
        fn append(&self, _line: &str) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[test]
    fn test_keba_table() {
        let sink = Arc::new(MetricSink::new(Arc::new(BroadcastBus::new(4)), Arc::new(NullLog)));
        let correlator = Arc::new(CycleCorrelator::new(MachineState::new("IMM-01"), sink.clone()));

        let bindings = build_bindings(&ProfileConfig::keba(), "IMM-01", &correlator, &sink);

        let summary: Vec<(String, Vec<String>)> = bindings
            .iter()
            .map(|b| {
                (
                    b.signal_name.clone(),
                    b.handlers.iter().map(|h| h.name().to_string()).collect(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("CycleTime".to_string(), vec!["publish".to_string(), "cycle_complete".to_string()]),
                ("DoorOpened".to_string(), vec!["publish".to_string(), "door".to_string()]),
                ("RawCycleTime".to_string(), vec!["raw_cycle_elapsed".to_string()]),
            ]
        );
        assert_eq!(bindings[0].node_address, "ns=4;s=APPL.system.sv_CycleTime_KVB");
        assert_eq!(bindings[0].sampling_interval_ms, 1000);
    }
}
