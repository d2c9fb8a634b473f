//! Worker thread and command queue around a [`Poller`].

use super::poller::{ControllerState, PollSettings, Poller};
use super::LineObserver;
use crate::error::{TesterError, TesterResult};
use crate::port::{OutputLine, PortOpener};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

type Reply<T> = mpsc::Sender<TesterResult<T>>;

/// Requests accepted by the worker.
enum Command {
    Open { device: String, reply: Reply<()> },
    Close { reply: Reply<()> },
    SetLine { line: OutputLine, level: bool, reply: Reply<()> },
    SetTxEnable { enabled: bool, reply: Reply<()> },
    Status { reply: mpsc::Sender<(ControllerState, Option<String>)> },
    Shutdown,
}

/// Handle to a polling worker.
///
/// Every method blocks only until the worker has applied the command, which
/// is at most one cycle away. Dropping the handle stops the worker and
/// closes any open session.
///
/// # Example
/// ```no_run
/// use rs232_tester::controller::{ControllerEvent, PollSettings, PollingController};
/// use rs232_tester::port::SystemPortOpener;
/// use std::sync::{mpsc, Arc};
///
/// let (events, snapshots) = mpsc::channel::<ControllerEvent>();
/// let controller = PollingController::spawn(Arc::new(SystemPortOpener), PollSettings::default(), events)?;
/// controller.open("/dev/ttyUSB0")?;
/// controller.set_dtr(false)?;
/// if let Ok(ControllerEvent::Snapshot(s)) = snapshots.recv() {
///     println!("CTS is {}", s.inputs.cts);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PollingController {
    commands: mpsc::Sender<Command>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PollingController {
    /// Start a worker in the `Closed` state.
    pub fn spawn<O: LineObserver>(
        opener: Arc<dyn PortOpener>,
        settings: PollSettings,
        observer: O,
    ) -> io::Result<Self> {
        let (commands, queue) = mpsc::channel();
        let poller = Poller::new(opener, settings);
        let worker = thread::Builder::new()
            .name("rs232-poller".to_string())
            .spawn(move || run(poller, queue, observer))?;

        Ok(Self {
            commands,
            worker: Some(worker),
        })
    }

    fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> TesterResult<T> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| TesterError::Shutdown)?;
        response.recv().map_err(|_| TesterError::Shutdown)?
    }

    /// Open `device` and start sampling; the first snapshot follows at once.
    pub fn open(&self, device: &str) -> TesterResult<()> {
        let device = device.to_string();
        self.request(|reply| Command::Open { device, reply })
    }

    /// Stop sampling and release the device. A no-op when closed.
    pub fn close(&self) -> TesterResult<()> {
        self.request(|reply| Command::Close { reply })
    }

    /// Assert or deassert DTR.
    pub fn set_dtr(&self, level: bool) -> TesterResult<()> {
        self.set_line(OutputLine::Dtr, level)
    }

    /// Assert or deassert RTS.
    pub fn set_rts(&self, level: bool) -> TesterResult<()> {
        self.set_line(OutputLine::Rts, level)
    }

    /// Assert or deassert an output line.
    pub fn set_line(&self, line: OutputLine, level: bool) -> TesterResult<()> {
        self.request(|reply| Command::SetLine { line, level, reply })
    }

    /// Turn the TX/RX loopback test on or off.
    pub fn set_tx_enable(&self, enabled: bool) -> TesterResult<()> {
        self.request(|reply| Command::SetTxEnable { enabled, reply })
    }

    /// Current state and open device.
    pub fn status(&self) -> TesterResult<(ControllerState, Option<String>)> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(Command::Status { reply })
            .map_err(|_| TesterError::Shutdown)?;
        response.recv().map_err(|_| TesterError::Shutdown)
    }

    /// Current state; `Closed` once the worker is gone.
    pub fn state(&self) -> ControllerState {
        self.status()
            .map(|(state, _)| state)
            .unwrap_or(ControllerState::Closed)
    }

    /// Stop the worker and wait for it, closing any open session.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PollingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingController")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

fn run<O: LineObserver>(mut poller: Poller, queue: mpsc::Receiver<Command>, mut observer: O) {
    let interval = poller.settings().interval;
    let mut next_tick: Option<Instant> = None;

    loop {
        let received = match next_tick {
            Some(deadline) => queue.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => queue.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => {
                apply(&mut poller, command);
                next_tick = match (poller.state(), next_tick) {
                    // First cycle right after open, not one interval later.
                    (ControllerState::Running, None) => Some(Instant::now()),
                    (ControllerState::Running, scheduled) => scheduled,
                    _ => None,
                };
            }
            Err(RecvTimeoutError::Timeout) => {
                let deadline = next_tick.unwrap_or_else(Instant::now);
                poller.tick(&mut observer);
                next_tick = match poller.state() {
                    ControllerState::Running => Some(next_deadline(deadline, interval, Instant::now())),
                    _ => None,
                };
            }
        }
    }

    let _ = poller.close();
    debug!("polling worker stopped");
}

fn apply(poller: &mut Poller, command: Command) {
    match command {
        Command::Open { device, reply } => {
            let _ = reply.send(poller.open(&device));
        }
        Command::Close { reply } => {
            let _ = reply.send(poller.close());
        }
        Command::SetLine { line, level, reply } => {
            let _ = reply.send(poller.set_output(line, level));
        }
        Command::SetTxEnable { enabled, reply } => {
            let _ = reply.send(poller.set_tx_enable(enabled));
        }
        Command::Status { reply } => {
            let _ = reply.send((poller.state(), poller.device().map(str::to_string)));
        }
        Command::Shutdown => {}
    }
}

/// Next tick on the same grid, skipping any slots a slow cycle overran.
fn next_deadline(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = previous + interval;
    let mut skipped = 0u32;
    while next <= now {
        next += interval;
        skipped += 1;
    }
    if skipped > 0 {
        trace!(skipped, "cycle overran, ticks coalesced");
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerEvent;
    use crate::port::{EchoMode, MockPortRegistry};

    const WAIT: Duration = Duration::from_secs(2);

    fn settings() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(5),
            ..PollSettings::default()
        }
    }

    fn spawn(registry: &MockPortRegistry) -> (PollingController, mpsc::Receiver<ControllerEvent>) {
        let (events, rx) = mpsc::channel();
        let controller = PollingController::spawn(Arc::new(registry.clone()), settings(), events).unwrap();
        (controller, rx)
    }

    #[test]
    fn test_next_deadline_keeps_grid() {
        let start = Instant::now();
        let interval = Duration::from_millis(50);

        assert_eq!(next_deadline(start, interval, start), start + interval);
        assert_eq!(
            next_deadline(start, interval, start + Duration::from_millis(120)),
            start + Duration::from_millis(150)
        );
    }

    #[test]
    fn test_open_emits_snapshots() {
        let registry = MockPortRegistry::new();
        registry.add("MOCK0");
        let (controller, events) = spawn(&registry);

        controller.open("MOCK0").unwrap();
        assert_eq!(controller.state(), ControllerState::Running);

        let first = events.recv_timeout(WAIT).unwrap();
        assert!(matches!(first, ControllerEvent::Snapshot(s) if s.sequence == 1));
        let second = events.recv_timeout(WAIT).unwrap();
        assert!(matches!(second, ControllerEvent::Snapshot(s) if s.sequence == 2));
    }

    #[test]
    fn test_commands_while_closed() {
        let registry = MockPortRegistry::new();
        let (controller, events) = spawn(&registry);

        assert!(controller.close().is_ok());
        assert!(matches!(controller.set_dtr(true), Err(TesterError::NotOpen)));
        assert!(matches!(controller.set_tx_enable(true), Err(TesterError::NotOpen)));
        assert!(matches!(
            controller.open("nonexistent-device"),
            Err(TesterError::Connection { .. })
        ));
        assert!(events.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_close_stops_cycles_and_releases() {
        let registry = MockPortRegistry::new();
        let port = registry.add("MOCK0");
        let (controller, events) = spawn(&registry);

        controller.open("MOCK0").unwrap();
        events.recv_timeout(WAIT).unwrap();
        controller.close().unwrap();
        assert_eq!(port.open_handles(), 0);

        // Drain whatever completed before the close, then expect silence.
        while events.try_recv().is_ok() {}
        assert!(events.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_dtr_echo_within_one_cycle() {
        let registry = MockPortRegistry::new();
        registry.add("MOCK0");
        let (controller, events) = spawn(&registry);

        controller.open("MOCK0").unwrap();
        controller.set_dtr(false).unwrap();

        // Cycles that ran before the command are already queued; the first
        // one after them started with DTR low.
        while events.try_recv().is_ok() {}
        match events.recv_timeout(WAIT).unwrap() {
            ControllerEvent::Snapshot(s) => assert!(!s.dtr),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_disconnect_is_reported_once() {
        let registry = MockPortRegistry::new();
        let port = registry.add("MOCK0");
        let (controller, events) = spawn(&registry);

        controller.open("MOCK0").unwrap();
        events.recv_timeout(WAIT).unwrap();
        port.set_disconnected(true);

        let disconnect = loop {
            match events.recv_timeout(WAIT).unwrap() {
                ControllerEvent::Snapshot(_) => continue,
                ControllerEvent::Disconnected(e) => break e,
            }
        };
        assert!(disconnect.is_disconnect());
        assert!(events.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(controller.state(), ControllerState::Closed);
        assert!(matches!(controller.set_rts(true), Err(TesterError::NotOpen)));
        assert_eq!(port.open_handles(), 0);
    }

    #[test]
    fn test_loopback_match_through_worker() {
        let registry = MockPortRegistry::new();
        let port = registry.add("MOCK0");
        port.set_echo(EchoMode::Loopback);
        let (controller, events) = spawn(&registry);

        controller.open("MOCK0").unwrap();
        controller.set_tx_enable(true).unwrap();

        let matched = (0..50)
            .filter_map(|_| match events.recv_timeout(WAIT) {
                Ok(ControllerEvent::Snapshot(s)) => Some(s),
                _ => None,
            })
            .find(|s| s.tx_enabled);
        assert!(matched.is_some_and(|s| s.rx_match()));
    }

    #[test]
    fn test_drop_closes_session() {
        let registry = MockPortRegistry::new();
        let port = registry.add("MOCK0");
        let (controller, _events) = spawn(&registry);

        controller.open("MOCK0").unwrap();
        assert_eq!(port.open_handles(), 1);
        drop(controller);
        assert_eq!(port.open_handles(), 0);
    }
}
