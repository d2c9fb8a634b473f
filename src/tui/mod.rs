//! Terminal lamp panel.
//!
//! A ratatui front end over [`PollingController`](crate::controller::PollingController):
//! a device list on the left, one lamp per RS-232 line on the right, with
//! keys to open and close the device and to drive DTR, RTS and the TX
//! loopback test.
//!
//! # Example
//!
//! ```no_run
//! use rs232_tester::config::Config;
//! use rs232_tester::port::SystemPortOpener;
//! use std::sync::Arc;
//!
//! rs232_tester::tui::run(Config::default(), Arc::new(SystemPortOpener))?;
//! # Ok::<(), std::io::Error>(())
//! ```

mod app;
mod event;
mod theme;
mod ui;

pub use app::{App, AppState, DeviceEntry, Mode};
pub use event::{Event, EventForwarder, EventHandler};
pub use theme::{Theme, THEMES};
pub use ui::render;

use crate::config::Config;
use crate::port::PortOpener;
use std::io;
use std::sync::Arc;

/// Run the interactive panel until the operator quits.
pub fn run(config: Config, opener: Arc<dyn PortOpener>) -> io::Result<()> {
    let events = EventHandler::new(config.tui.refresh_interval())?;
    let app = App::new(config, opener, events.sender())?;
    app.run(events)
}
