//! The sampling state machine.
//!
//! `Poller` is the single-threaded heart of the controller: it owns the
//! session, applies operator commands and runs one cycle per call to
//! [`Poller::tick`]. Scheduling lives in the worker; keeping it out of here
//! lets tests step cycles by hand.

use super::snapshot::{LineSnapshot, RxStatus, DEFAULT_LOOPBACK_BYTE};
use super::LineObserver;
use crate::config::PollingConfig;
use crate::error::{TesterError, TesterResult};
use crate::port::{OutputLine, PortConfiguration, PortOpener};
use crate::session::PortSession;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reference sampling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ControllerState {
    /// No session.
    #[default]
    Closed,
    /// Session open, sampling not started yet.
    OpenIdle,
    /// Session open and sampled every interval.
    Running,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::OpenIdle => f.write_str("open"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Tunables for a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Time between cycle starts.
    pub interval: Duration,
    /// Byte written to TX while the loopback test is on.
    pub loopback_byte: u8,
    /// DTR level applied when sampling starts.
    pub initial_dtr: bool,
    /// RTS level applied when sampling starts.
    pub initial_rts: bool,
    /// Connection profile handed to the opener.
    pub port: PortConfiguration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            loopback_byte: DEFAULT_LOOPBACK_BYTE,
            initial_dtr: true,
            initial_rts: true,
            port: PortConfiguration::default(),
        }
    }
}

impl From<&PollingConfig> for PollSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            loopback_byte: config.loopback_byte,
            initial_dtr: config.initial_dtr,
            initial_rts: config.initial_rts,
            port: PortConfiguration::default(),
        }
    }
}

/// Output line levels the operator asked for but the driver refused.
#[derive(Debug, Clone, Copy, Default)]
struct PendingLines {
    dtr: Option<bool>,
    rts: Option<bool>,
}

impl PendingLines {
    fn slot(&mut self, line: OutputLine) -> &mut Option<bool> {
        match line {
            OutputLine::Dtr => &mut self.dtr,
            OutputLine::Rts => &mut self.rts,
        }
    }
}

/// Owns the session and runs sampling cycles.
pub struct Poller {
    opener: Arc<dyn PortOpener>,
    settings: PollSettings,
    session: Option<PortSession>,
    state: ControllerState,
    tx_enabled: bool,
    pending: PendingLines,
    sequence: u64,
}

impl Poller {
    /// Create a closed poller.
    pub fn new(opener: Arc<dyn PortOpener>, settings: PollSettings) -> Self {
        Self {
            opener,
            settings,
            session: None,
            state: ControllerState::Closed,
            tx_enabled: false,
            pending: PendingLines::default(),
            sequence: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Device of the open session, if any.
    pub fn device(&self) -> Option<&str> {
        self.session.as_ref().map(PortSession::device)
    }

    /// Settings this poller was built with.
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Open `device` and start sampling.
    ///
    /// # Errors
    ///
    /// - `TesterError::AlreadyOpen` if a session is already open
    /// - `TesterError::Connection` if the device cannot be opened or sampling
    ///   cannot start; no handle is held afterwards
    pub fn open(&mut self, device: &str) -> TesterResult<()> {
        if let Some(open) = self.device() {
            return Err(TesterError::AlreadyOpen(open.to_string()));
        }

        let session = PortSession::open(self.opener.as_ref(), device, &self.settings.port)?;
        self.session = Some(session);
        self.state = ControllerState::OpenIdle;
        self.tx_enabled = false;
        self.pending = PendingLines::default();
        self.sequence = 0;

        if let Err(e) = self.start() {
            warn!(device, error = %e, "sampling could not start, closing");
            self.teardown();
            return Err(match e {
                TesterError::Io { device, source } => TesterError::Connection { device, source },
                other => other,
            });
        }
        Ok(())
    }

    fn start(&mut self) -> TesterResult<()> {
        let session = self.session.as_mut().ok_or(TesterError::NotOpen)?;
        session.set_output_line(OutputLine::Dtr, self.settings.initial_dtr)?;
        session.set_output_line(OutputLine::Rts, self.settings.initial_rts)?;
        self.state = ControllerState::Running;
        info!(device = session.device(), "sampling started");
        Ok(())
    }

    /// Stop sampling and release the session. A no-op when already closed.
    pub fn close(&mut self) -> TesterResult<()> {
        if self.session.is_some() {
            self.teardown();
        }
        Ok(())
    }

    fn teardown(&mut self) {
        self.state = ControllerState::Closed;
        self.tx_enabled = false;
        self.pending = PendingLines::default();
        if let Some(mut session) = self.session.take() {
            let _ = session.close();
        }
    }

    /// Drive an output line right away.
    ///
    /// When the driver refuses, the level is remembered and retried at the
    /// start of the next cycle, and the error is returned.
    pub fn set_output(&mut self, line: OutputLine, level: bool) -> TesterResult<()> {
        let session = self.session.as_mut().ok_or(TesterError::NotOpen)?;
        match session.set_output_line(line, level) {
            Ok(()) => {
                *self.pending.slot(line) = None;
                Ok(())
            }
            Err(e) => {
                warn!(%line, level, error = %e, "output line rejected, retrying next cycle");
                *self.pending.slot(line) = Some(level);
                Err(e)
            }
        }
    }

    /// Turn the loopback test on or off.
    ///
    /// Switching it on drops whatever arrived on RX while it was off, so the
    /// first loopback cycle only sees its own byte.
    pub fn set_tx_enable(&mut self, enabled: bool) -> TesterResult<()> {
        let session = self.session.as_mut().ok_or(TesterError::NotOpen)?;
        if enabled && !self.tx_enabled {
            session.discard_input()?;
        }
        debug!(enabled, "loopback test toggled");
        self.tx_enabled = enabled;
        Ok(())
    }

    /// Run one cycle and report it to `observer`.
    ///
    /// Emits exactly one snapshot or, when the line failed, exactly one
    /// disconnect (after the session has been released). Does nothing unless
    /// the poller is running.
    pub fn tick(&mut self, observer: &mut dyn LineObserver) {
        if self.state != ControllerState::Running {
            return;
        }
        match self.cycle() {
            Ok(snapshot) => observer.on_snapshot(snapshot),
            Err(e) => {
                warn!(device = self.device().unwrap_or_default(), error = %e, "line failed, closing session");
                self.teardown();
                observer.on_disconnected(e);
            }
        }
    }

    fn cycle(&mut self) -> TesterResult<LineSnapshot> {
        let session = self.session.as_mut().ok_or(TesterError::NotOpen)?;

        for line in OutputLine::ALL {
            if let Some(level) = *self.pending.slot(line) {
                session.set_output_line(line, level)?;
                *self.pending.slot(line) = None;
            }
        }

        let inputs = session.read_input_lines()?;
        let dtr = session.read_output_line_echo(OutputLine::Dtr)?;
        let rts = session.read_output_line_echo(OutputLine::Rts)?;

        let rx = if self.tx_enabled {
            let test_byte = self.settings.loopback_byte;
            if session.try_write(&[test_byte])? == 0 {
                debug!("loopback byte not accepted this cycle");
            }
            let received = session.try_read_available()?;
            let rx = RxStatus::classify(&received, test_byte);
            session.discard_input()?;
            rx
        } else {
            session.discard_input()?;
            RxStatus::Silent
        };

        self.sequence += 1;
        Ok(LineSnapshot {
            sequence: self.sequence,
            inputs,
            dtr,
            rts,
            tx_enabled: self.tx_enabled,
            rx,
        })
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("state", &self.state)
            .field("device", &self.device())
            .field("tx_enabled", &self.tx_enabled)
            .field("sequence", &self.sequence)
            .finish()
    }
}
