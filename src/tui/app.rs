//! TUI Application state and main loop.

use crate::config::Config;
use crate::controller::{LineSnapshot, PollSettings, PollingController};
use crate::discovery;
use crate::port::{OutputLine, PortOpener};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::event::{Event, EventForwarder, EventHandler};
use super::theme::Theme;
use super::ui;

/// Application mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Lamp panel and device list
    #[default]
    Normal,
    /// Help overlay
    Help,
}

/// Application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Application is running
    Running,
    /// Application should quit
    Quitting,
}

/// One row of the device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// What the row shows: an alias or a device path
    pub label: String,
    /// What gets opened
    pub device: String,
}

/// Main TUI application.
pub struct App {
    /// Current app state
    pub state: AppState,
    /// Current mode
    pub mode: Mode,
    /// Current theme
    pub theme: Theme,
    /// Configuration
    pub config: Config,

    controller: PollingController,

    /// Aliases first, then enumerated devices
    pub devices: Vec<DeviceEntry>,
    /// Selected device index
    pub selected: usize,

    /// Device of the open session
    pub connected: Option<String>,
    /// When the session was opened (for uptime display)
    pub connect_time: Option<Instant>,
    /// Most recent cycle result of the open session
    pub snapshot: Option<LineSnapshot>,

    /// DTR level the operator last asked for
    pub dtr: bool,
    /// RTS level the operator last asked for
    pub rts: bool,
    /// Whether the loopback test is on
    pub tx_enabled: bool,

    /// Status message to display
    pub status_message: Option<String>,
    /// Whether the status message reports a failure
    pub status_is_error: bool,
}

impl App {
    /// Create an application whose controller reports into `events`.
    pub fn new(
        config: Config,
        opener: Arc<dyn PortOpener>,
        events: std::sync::mpsc::Sender<Event>,
    ) -> io::Result<Self> {
        let theme = Theme::by_name(&config.tui.theme)
            .cloned()
            .unwrap_or_default();
        let settings = PollSettings::from(&config.polling);
        let controller = PollingController::spawn(opener, settings, EventForwarder(events))?;

        Ok(Self {
            state: AppState::Running,
            mode: Mode::Normal,
            theme,
            dtr: config.polling.initial_dtr,
            rts: config.polling.initial_rts,
            config,
            controller,
            devices: Vec::new(),
            selected: 0,
            connected: None,
            connect_time: None,
            snapshot: None,
            tx_enabled: false,
            status_message: None,
            status_is_error: false,
        })
    }

    /// Run the application main loop until the operator quits.
    pub fn run(mut self, events: EventHandler) -> io::Result<()> {
        let mut terminal = ui::setup_terminal()?;
        self.refresh_devices();

        let result = self.event_loop(&mut terminal, &events);

        self.controller.shutdown();
        ui::restore_terminal(terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut ui::Tui, events: &EventHandler) -> io::Result<()> {
        while self.state == AppState::Running {
            terminal.draw(|frame| ui::render(&*self, frame))?;
            match events.next() {
                Ok(event) => self.handle_event(event),
                Err(_) => self.state = AppState::Quitting,
            }
        }
        Ok(())
    }

    /// Apply one event to the application state.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick | Event::Resize(_, _) => {}
            Event::Key(key) => self.handle_key(key),
            Event::Snapshot(snapshot) => {
                // Cycles finished just before a close can still be queued.
                if self.connected.is_some() {
                    self.snapshot = Some(snapshot);
                }
            }
            Event::Disconnected(reason) => {
                info!(%reason, "device lost");
                self.clear_session();
                self.set_error(format!("Disconnected: {reason}"));
            }
            Event::Error(err) => self.set_error(format!("Terminal error: {err}")),
        }
    }

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.mode == Mode::Help {
            if matches!(key.code, KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?' | 'q')) {
                self.mode = Mode::Normal;
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.state = AppState::Quitting,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.state = AppState::Quitting
            }
            KeyCode::F(1) | KeyCode::Char('?') => self.mode = Mode::Help,
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.devices.len() {
                    self.selected += 1;
                }
            }
            KeyCode::F(5) | KeyCode::Char('s') => self.refresh_devices(),
            KeyCode::Enter | KeyCode::Char('o') => self.open_selected(),
            KeyCode::Char('c') => self.close(),
            KeyCode::Char('d') => self.toggle_line(OutputLine::Dtr),
            KeyCode::Char('r') => self.toggle_line(OutputLine::Rts),
            KeyCode::Char('t') => self.toggle_tx(),
            _ => {}
        }
    }

    /// Rescan devices, keeping configured aliases on top.
    pub fn refresh_devices(&mut self) {
        match discovery::list_candidate_devices() {
            Ok(found) => self.set_devices(found),
            Err(e) => {
                self.set_devices(Vec::new());
                self.set_error(format!("Failed to list devices: {e}"));
            }
        }
    }

    /// Replace the device list with `found` plus configured aliases.
    pub fn set_devices(&mut self, found: Vec<String>) {
        let mut aliases: Vec<_> = self.config.serial.port_aliases.iter().collect();
        aliases.sort();

        self.devices = aliases
            .into_iter()
            .map(|(alias, device)| DeviceEntry {
                label: format!("{alias} ({device})"),
                device: device.clone(),
            })
            .chain(found.into_iter().map(|device| DeviceEntry {
                label: device.clone(),
                device,
            }))
            .collect();

        if self.selected >= self.devices.len() {
            self.selected = self.devices.len().saturating_sub(1);
        }
        debug!(count = self.devices.len(), "device list refreshed");
    }

    fn open_selected(&mut self) {
        let Some(entry) = self.devices.get(self.selected) else {
            self.set_error("No devices available");
            return;
        };
        let device = entry.device.clone();

        match self.controller.open(&device) {
            Ok(()) => {
                self.connected = Some(device.clone());
                self.connect_time = Some(Instant::now());
                self.snapshot = None;
                self.dtr = self.config.polling.initial_dtr;
                self.rts = self.config.polling.initial_rts;
                self.tx_enabled = false;
                self.set_status(format!("Opened {device}"));
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    fn close(&mut self) {
        let Some(device) = self.connected.clone() else {
            return;
        };
        match self.controller.close() {
            Ok(()) => {
                self.clear_session();
                self.set_status(format!("Closed {device}"));
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    fn toggle_line(&mut self, line: OutputLine) {
        if self.connected.is_none() {
            self.set_error("Open a device first");
            return;
        }
        let level = match line {
            OutputLine::Dtr => &mut self.dtr,
            OutputLine::Rts => &mut self.rts,
        };
        *level = !*level;
        let level = *level;

        match self.controller.set_line(line, level) {
            Ok(()) => self.set_status(format!("{line} {}", if level { "on" } else { "off" })),
            Err(e) => self.set_error(format!("{line}: {e} (will retry)")),
        }
    }

    fn toggle_tx(&mut self) {
        if self.connected.is_none() {
            self.set_error("Open a device first");
            return;
        }
        let enabled = !self.tx_enabled;
        match self.controller.set_tx_enable(enabled) {
            Ok(()) => {
                self.tx_enabled = enabled;
                self.set_status(format!("Loopback test {}", if enabled { "on" } else { "off" }));
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    fn clear_session(&mut self) {
        self.connected = None;
        self.connect_time = None;
        self.snapshot = None;
        self.tx_enabled = false;
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_is_error = false;
    }

    fn set_error(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_is_error = true;
    }

    /// Get uptime string.
    pub fn uptime_string(&self) -> String {
        match self.connect_time {
            Some(start) => {
                let secs = start.elapsed().as_secs();
                format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
            }
            None => "--:--:--".to_string(),
        }
    }
}
