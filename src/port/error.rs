//! Port-specific error types.
//!
//! Errors raised by a serial adapter, kept separate from the controller-level
//! [`TesterError`](crate::error::TesterError) so adapters stay reusable.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The port exists but another process holds it.
    #[error("Serial port is busy: {0}")]
    Busy(String),

    /// The OS refused access to the port.
    #[error("Permission denied for serial port: {0}")]
    PermissionDenied(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Attempted to use a port that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Busy error from a port name.
    pub fn busy(port_name: impl Into<String>) -> Self {
        Self::Busy(port_name.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Whether this error only means "nothing moved before the timeout".
    ///
    /// Polling treats these as zero bytes transferred rather than a failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Classify an error from `serialport::SerialPortBuilder::open`.
    pub fn from_open_error(port_name: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::not_found(port_name),
            serialport::ErrorKind::Io(io::ErrorKind::NotFound) => Self::not_found(port_name),
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                Self::PermissionDenied(port_name.to_string())
            }
            serialport::ErrorKind::Io(io::ErrorKind::AddrInUse)
            | serialport::ErrorKind::Io(io::ErrorKind::ResourceBusy) => Self::busy(port_name),
            _ => Self::Serial(err),
        }
    }
}
