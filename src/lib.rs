//! Live RS-232 line tester.
//!
//! Samples the modem-status inputs (CD, DSR, CTS, RI) of one serial device at
//! a fixed interval, drives its outputs (DTR, RTS) on request and optionally
//! runs a one-byte TX/RX loopback test each cycle.
//!
//! # Modules
//!
//! - `port`: adapter traits, the `serialport` backend and a mock
//! - `session`: exclusive ownership of one open device
//! - `controller`: the sampling state machine and its worker thread
//! - `discovery`: candidate device enumeration
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup
//! - `error`: controller-level error taxonomy
//! - `tui`: terminal lamp panel (when the `tui` feature is enabled)

pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod port;
pub mod session;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use controller::{
    ControllerEvent, ControllerState, LineObserver, LineSnapshot, PollSettings, PollingController,
    RxStatus,
};
pub use error::{TesterError, TesterResult};
pub use port::{
    InputLines, MockPortRegistry, MockSerialPort, OutputLine, PortError, PortOpener,
    SerialPortAdapter, SystemPortOpener,
};
pub use session::PortSession;
