//! Injection-molding machine telemetry acquisition service.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────── per machine ────────────────────────────┐
//!                 │                                                                      │
//!   controller    │  ┌────────────┐   session    ┌──────────┐   handler chains          │
//!   feed ─────────┼─▶│ supervisor │─────────────▶│  router  │──────────┬───────────┐    │
//!                 │  │ (reconnect)│  registrations└──────────┘          │           │    │
//!                 │  └────────────┘                    ▲                ▼           ▼    │
//!                 │                        suspension  │         ┌────────────┐ ┌───────┐│
//!                 │                                    └─────────│ correlator │ │publish││
//!                 │                                              └─────┬──────┘ └───┬───┘│
//!                 └────────────────────────────────────────────────────┼────────────┼────┘
//!                                                                      ▼            ▼
//!                                                                ┌────────────────────┐
//!                                                                │    metric sink     │
//!                                                                │  bus  +  shift log │
//!                                                                └────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use imm_telemetry::config::{load_config, ConfigWatcher};
use imm_telemetry::feed::simulator::{CycleSimulator, SimulatorNodes};
use imm_telemetry::feed::{Feed, MemoryFeed};
use imm_telemetry::lifecycle::{
    apply_reload, build_machines, spawn_bus_logger, wait_for_shutdown_signal, Shutdown, StartupError,
};
use imm_telemetry::observability::{logging, metrics};
use imm_telemetry::sink::{BroadcastBus, MetricSink, ShiftLogAppender};

#[derive(Parser)]
#[command(name = "imm-telemetry")]
#[command(about = "Acquire cycle telemetry from injection-molding machines", long_about = None)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, default_value = "imm-telemetry.toml")]
    config: PathBuf,

    /// Drive every machine from a synthetic cycle generator.
    #[arg(long)]
    simulate: bool,

    /// Simulated cycle length in seconds.
    #[arg(long, default_value_t = 6)]
    cycle_secs: u64,

    /// Simulated door-open time in seconds.
    #[arg(long, default_value_t = 2)]
    door_open_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).map_err(StartupError::from)?;
    logging::init_logging(&config.observability).map_err(StartupError::from)?;

    tracing::info!(
        config = %cli.config.display(),
        machines = config.machines.len(),
        "imm-telemetry v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if !cli.simulate {
        tracing::error!("No controller transport is built in; run with --simulate");
        return Err(StartupError::Unsupported("controller transport unavailable, use --simulate".into()).into());
    }

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr).map_err(StartupError::from)?;
    }

    let shutdown = Shutdown::new();
    let bus = Arc::new(BroadcastBus::new(config.bus.capacity));
    let log = Arc::new(ShiftLogAppender::from_config(&config.shift_log));
    tracing::info!(directory = %log.directory().display(), "Shift log ready");
    let sink = Arc::new(MetricSink::new(bus.clone(), log));

    let mut tasks = vec![spawn_bus_logger(&bus, shutdown.subscribe())];

    let mut simulated = Vec::new();
    let machines = build_machines(&config, &sink, |machine| {
        let feed = Arc::new(MemoryFeed::new(&machine.endpoint));
        if let Some(profile) = config.profile(&machine.profile) {
            simulated.push((feed.clone(), SimulatorNodes::from_profile(profile)));
        }
        feed as Arc<dyn Feed>
    })?;
    let machines = Arc::new(machines);

    for machine in machines.iter() {
        tasks.push(machine.spawn(shutdown.subscribe()));
    }
    for (feed, nodes) in simulated {
        let simulator = CycleSimulator::new(
            feed,
            nodes,
            Duration::from_secs(cli.cycle_secs),
            Duration::from_secs(cli.door_open_secs),
        );
        tasks.push(tokio::spawn(simulator.run(shutdown.subscribe())));
    }

    let (watcher, mut updates) = ConfigWatcher::new(&cli.config, config.clone());
    let _watch_handle = watcher.run().map_err(StartupError::from)?;
    {
        let machines = Arc::clone(&machines);
        let mut current = config.clone();
        let mut stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.recv() => break,
                    next = updates.recv() => {
                        let Some(next) = next else { break };
                        let updated = apply_reload(&machines, &current, &next);
                        tracing::info!(updated, "Configuration reloaded");
                        current = next;
                    }
                }
            }
        }));
    }

    tracing::info!(machines = machines.len(), "Acquisition running");

    wait_for_shutdown_signal().await?;
    tracing::info!("Shutting down");
    shutdown.trigger();

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Task ended abnormally");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
