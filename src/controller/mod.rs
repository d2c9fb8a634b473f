//! Signal polling and line-control engine.
//!
//! # Architecture
//!
//! ```text
//! front end ──commands──> PollingController ──mpsc──> worker thread
//!     ^                                                  │ owns Poller
//!     └──────── LineObserver (snapshots / disconnects) ───┘ owns PortSession
//! ```
//!
//! The worker is the only code that touches the port, so commands and cycles
//! are serialized by construction.

mod poller;
mod snapshot;
mod worker;

pub use poller::{ControllerState, PollSettings, Poller, DEFAULT_POLL_INTERVAL};
pub use snapshot::{LineSnapshot, RxStatus, DEFAULT_LOOPBACK_BYTE};
pub use worker::PollingController;

use crate::error::TesterError;
use std::sync::mpsc;

/// Receives the results of sampling cycles.
///
/// Called from the worker thread, once per completed cycle.
pub trait LineObserver: Send + 'static {
    /// A cycle completed.
    fn on_snapshot(&mut self, snapshot: LineSnapshot);

    /// The line failed and the session was closed. Not called for an
    /// operator-initiated close.
    fn on_disconnected(&mut self, error: TesterError);
}

/// Cycle results as plain messages.
#[derive(Debug)]
pub enum ControllerEvent {
    /// See [`LineObserver::on_snapshot`].
    Snapshot(LineSnapshot),
    /// See [`LineObserver::on_disconnected`].
    Disconnected(TesterError),
}

impl LineObserver for mpsc::Sender<ControllerEvent> {
    fn on_snapshot(&mut self, snapshot: LineSnapshot) {
        let _ = self.send(ControllerEvent::Snapshot(snapshot));
    }

    fn on_disconnected(&mut self, error: TesterError) {
        let _ = self.send(ControllerEvent::Disconnected(error));
    }
}
