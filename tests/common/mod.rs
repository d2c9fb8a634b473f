//! Shared test utilities for the tester's integration tests.
//!
//! - Mock device tables with named ports
//! - Fast poll settings so worker-driven tests finish quickly
//! - Helpers that step a `Poller` or drain controller events

#![allow(dead_code)]

use rs232_tester::controller::{ControllerEvent, LineSnapshot, PollSettings, Poller};
use rs232_tester::port::{MockPortRegistry, MockSerialPort};
use std::sync::mpsc;
use std::time::Duration;

/// How long a worker test waits for any single event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Create a registry with one mock port and return both.
pub fn registry_with(port_name: &str) -> (MockPortRegistry, MockSerialPort) {
    let registry = MockPortRegistry::new();
    let port = registry.add(port_name);
    (registry, port)
}

/// Default settings with a short interval.
pub fn fast_settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(5),
        ..PollSettings::default()
    }
}

/// Run one cycle and return everything it reported.
pub fn step(poller: &mut Poller) -> Vec<ControllerEvent> {
    let (mut tx, rx) = mpsc::channel();
    poller.tick(&mut tx);
    drop(tx);
    rx.try_iter().collect()
}

/// Run one cycle that must produce exactly one snapshot.
pub fn step_snapshot(poller: &mut Poller) -> LineSnapshot {
    match step(poller).as_slice() {
        [ControllerEvent::Snapshot(s)] => *s,
        other => panic!("expected one snapshot, got {other:?}"),
    }
}

/// Wait for the next snapshot, panicking on a disconnect.
pub fn next_snapshot(events: &mpsc::Receiver<ControllerEvent>) -> LineSnapshot {
    match events.recv_timeout(EVENT_TIMEOUT) {
        Ok(ControllerEvent::Snapshot(s)) => s,
        Ok(ControllerEvent::Disconnected(e)) => panic!("unexpected disconnect: {e}"),
        Err(e) => panic!("no snapshot within {EVENT_TIMEOUT:?}: {e}"),
    }
}

/// Wait for the first snapshot satisfying `pred`.
pub fn snapshot_where(
    events: &mpsc::Receiver<ControllerEvent>,
    pred: impl Fn(&LineSnapshot) -> bool,
) -> LineSnapshot {
    loop {
        let snapshot = next_snapshot(events);
        if pred(&snapshot) {
            return snapshot;
        }
    }
}
