//! Failure injection tests for the acquisition core.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use imm_telemetry::config::ReconnectConfig;
use imm_telemetry::feed::{Feed, MemoryFeed, SignalNotification, SignalValue};
use imm_telemetry::lifecycle::Shutdown;
use imm_telemetry::routing::{handler_fn, DispatchOutcome, HandlerError, SignalBinding, SignalRouter, SuspensionSet};
use imm_telemetry::supervisor::{ConnectionState, ConnectionSupervisor};

mod common;
use common::{ts, Harness, CYCLE_NODE, DOOR_NODE};

#[tokio::test]
async fn test_bus_outage_keeps_log_and_chain() {
    let h = Harness::keba();
    h.runtime.connect().await;
    h.bus.set_failing(true);

    h.send(DOOR_NODE, SignalValue::Byte(1), "2024-03-01T10:00:00Z");
    h.send(DOOR_NODE, SignalValue::Byte(0), "2024-03-01T10:00:02Z");
    h.send(CYCLE_NODE, SignalValue::Integer(30_000_000), "2024-03-01T10:00:05Z");

    assert!(h.bus.messages().is_empty());
    let lines = h.log.lines();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[3], "IMM-01,CycleDuration,3.000,2024-03-01T10:00:05Z");
    assert_eq!(lines[4], "IMM-01,DoorOpenDuration,2.000,2024-03-01T10:00:05Z");
}

#[tokio::test]
async fn test_log_outage_keeps_bus() {
    let h = Harness::keba();
    h.runtime.connect().await;
    h.log.set_failing(true);

    h.send(CYCLE_NODE, SignalValue::Integer(30_000_000), "2024-03-01T10:00:05Z");

    assert!(h.log.lines().is_empty());
    assert_eq!(h.bus.metrics("CycleTime").len(), 1);
    assert_eq!(h.bus.cycles().len(), 1);
}

#[tokio::test]
async fn test_type_mismatch_is_isolated() {
    let h = Harness::keba();
    h.runtime.connect().await;

    let outcome = h.runtime.router().dispatch(&SignalNotification::new(
        "DoorOpened",
        SignalValue::Double(1.0),
        ts("2024-03-01T10:00:00Z"),
    ));
    // publish accepts any value; the door handler rejects a double.
    assert_eq!(outcome, DispatchOutcome::Delivered { handlers: 2, failures: 1 });
    assert_eq!(h.runtime.correlator().snapshot().door_open_time(), None);

    h.send(CYCLE_NODE, SignalValue::Integer(10_000_000), "2024-03-01T10:00:01Z");
    assert_eq!(h.bus.cycles().len(), 1);
}

#[tokio::test]
async fn test_negative_ticks_rejected() {
    let h = Harness::keba();
    h.runtime.connect().await;

    h.send(CYCLE_NODE, SignalValue::Integer(-5), "2024-03-01T10:00:01Z");
    assert!(h.bus.cycles().is_empty());
    assert_eq!(h.bus.metrics("CycleTime").len(), 1);
}

#[tokio::test]
async fn test_panicking_handler_does_not_stop_chain() {
    let feed = Arc::new(MemoryFeed::new("opc.tcp://imm-09:4840"));
    let router = Arc::new(SignalRouter::new("IMM-09", SuspensionSet::new()));
    let after = Arc::new(AtomicUsize::new(0));
    let counter = after.clone();

    let binding = SignalBinding::new(
        DOOR_NODE,
        "DoorOpened",
        1000,
        vec![
            handler_fn("explodes", |_| panic!("boom")),
            handler_fn("fails", |_| Err(HandlerError::OutOfRange("nope".into()))),
            handler_fn("counts", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ],
    );
    let supervisor = ConnectionSupervisor::new(feed.clone(), router.clone(), vec![binding], 1000, &ReconnectConfig::default());
    supervisor.connect().await;

    feed.publish(DOOR_NODE, SignalValue::Byte(1), ts("2024-03-01T10:00:00Z"));
    feed.publish(DOOR_NODE, SignalValue::Byte(0), ts("2024-03-01T10:00:01Z"));
    assert_eq!(after.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stale_session_is_dropped() {
    let h = Harness::keba();
    h.runtime.connect().await;
    let router = h.runtime.router().clone();
    let old_session = router.session();

    h.bounce().await;
    assert_ne!(router.session(), old_session);

    let outcome = router.deliver(
        old_session,
        imm_telemetry::feed::ItemHandle(2),
        SignalValue::Byte(1),
        ts("2024-03-01T10:00:00Z"),
    );
    assert_eq!(outcome, DispatchOutcome::StaleSession);
    assert!(h.bus.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retries_until_controller_comes_back() {
    let h = Harness::keba();
    h.feed.fail_next_connects(3, "connection refused");
    let shutdown = Shutdown::new();
    let task = h.runtime.spawn(shutdown.subscribe());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.runtime.state(), ConnectionState::Disconnected);
    assert_eq!(h.feed.connect_attempts(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.feed.connect_attempts(), 4);
    assert_eq!(h.runtime.state(), ConnectionState::Connected);

    // Never fires while connected.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.feed.connect_attempts(), 4);
    assert!(!h.runtime.supervisor().timer().is_armed());

    shutdown.trigger();
    task.await.unwrap();
    assert_eq!(h.feed.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_subscribe_does_not_strand_machine() {
    let h = Harness::keba();
    h.feed.fail_next_subscribes(1, "BadTooManySubscriptions");
    let shutdown = Shutdown::new();
    let task = h.runtime.spawn(shutdown.subscribe());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.runtime.state(), ConnectionState::Disconnected);
    assert!(!h.feed.is_connected());

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.runtime.state(), ConnectionState::Connected);
    assert_eq!(h.feed.connect_attempts(), 2);

    // A later transport drop is still noticed and recovered.
    h.feed.set_connected_quietly(false);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.runtime.state(), ConnectionState::Connected);
    assert_eq!(h.feed.connect_attempts(), 3);
    assert_eq!(h.feed.live_subscriptions(), 1);

    h.send(DOOR_NODE, SignalValue::Byte(1), "2024-03-01T10:00:00Z");
    assert_eq!(h.bus.metrics("DoorOpened").len(), 1);

    shutdown.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn test_rejected_signal_keeps_machine_disconnected() {
    let h = Harness::keba();
    h.feed.reject_node(CYCLE_NODE);
    h.runtime.connect().await;

    assert_eq!(h.runtime.state(), ConnectionState::Disconnected);
    assert!(h.runtime.supervisor().timer().is_armed());
    assert_eq!(h.send(DOOR_NODE, SignalValue::Byte(1), "2024-03-01T10:00:00Z"), 0);

    h.feed.accept_node(CYCLE_NODE);
    h.runtime.supervisor().reconnect_tick().await;
    assert_eq!(h.runtime.state(), ConnectionState::Connected);
    assert_eq!(h.send(CYCLE_NODE, SignalValue::Integer(10_000_000), "2024-03-01T10:00:01Z"), 1);
    assert_eq!(h.bus.cycles().len(), 1);
}
