//! Event handling for the TUI.
//!
//! Terminal input and controller output arrive on one channel, so the main
//! loop has a single place to block.

use crate::controller::{LineObserver, LineSnapshot};
use crate::error::TesterError;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Everything the main loop reacts to.
#[derive(Debug, Clone)]
pub enum Event {
    /// Redraw tick
    Tick,
    /// Keyboard input
    Key(KeyEvent),
    /// Terminal resize
    Resize(u16, u16),
    /// A sampling cycle completed
    Snapshot(LineSnapshot),
    /// The open device failed and was closed
    Disconnected(String),
    /// Reading the terminal failed
    Error(String),
}

/// Pumps terminal events and ticks into a channel from a background thread.
pub struct EventHandler {
    sender: mpsc::Sender<Event>,
    receiver: mpsc::Receiver<Event>,
    #[allow(dead_code)]
    handler: thread::JoinHandle<()>,
}

impl EventHandler {
    /// Create a new event handler with the specified tick rate.
    pub fn new(tick_rate: Duration) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let handler_sender = sender.clone();

        let handler = thread::Builder::new()
            .name("tui-events".to_string())
            .spawn(move || {
                let mut last_tick = Instant::now();
                loop {
                    let timeout = tick_rate
                        .checked_sub(last_tick.elapsed())
                        .unwrap_or(Duration::ZERO);

                    if event::poll(timeout).unwrap_or(false) {
                        let forwarded = match event::read() {
                            // Windows reports both press and release.
                            Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                                Some(Event::Key(key))
                            }
                            Ok(CrosstermEvent::Resize(width, height)) => {
                                Some(Event::Resize(width, height))
                            }
                            Ok(_) => None,
                            Err(e) => Some(Event::Error(e.to_string())),
                        };
                        if let Some(event) = forwarded {
                            if handler_sender.send(event).is_err() {
                                break;
                            }
                        }
                    }

                    if last_tick.elapsed() >= tick_rate {
                        if handler_sender.send(Event::Tick).is_err() {
                            break;
                        }
                        last_tick = Instant::now();
                    }
                }
            })?;

        Ok(Self {
            sender,
            receiver,
            handler,
        })
    }

    /// Get the next event, blocking until one is available.
    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Get a sender for pushing custom events.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.sender.clone()
    }
}

/// Feeds controller output into the TUI event channel.
#[derive(Debug, Clone)]
pub struct EventForwarder(pub mpsc::Sender<Event>);

impl LineObserver for EventForwarder {
    fn on_snapshot(&mut self, snapshot: LineSnapshot) {
        let _ = self.0.send(Event::Snapshot(snapshot));
    }

    fn on_disconnected(&mut self, error: TesterError) {
        let _ = self.0.send(Event::Disconnected(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::RxStatus;
    use crate::port::InputLines;

    #[test]
    fn test_forwarder_maps_controller_output() {
        let (tx, rx) = mpsc::channel();
        let mut forwarder = EventForwarder(tx);

        let snapshot = LineSnapshot {
            sequence: 3,
            inputs: InputLines::default(),
            dtr: true,
            rts: true,
            tx_enabled: false,
            rx: RxStatus::Silent,
        };
        forwarder.on_snapshot(snapshot);
        forwarder.on_disconnected(TesterError::NotOpen);

        assert!(matches!(rx.recv().unwrap(), Event::Snapshot(s) if s.sequence == 3));
        assert!(matches!(rx.recv().unwrap(), Event::Disconnected(msg) if msg.contains("no serial port")));
    }
}
