//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` lets real serial ports and mock implementations be used
//! interchangeably; `PortOpener` lets the session layer be handed either.

use super::error::PortError;
use super::lines::{InputLines, OutputLine};
use std::time::Duration;

/// Read/write timeout used for every session. Short enough that a sampling
/// cycle can never stall on I/O.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(100);

/// Baud rate of the fixed connection profile (8N1, no flow control).
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Connection parameters for a serial port.
///
/// The tester always connects at one fixed profile; only the timeout is
/// exposed so tests can shrink it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Read/write timeout.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Trait for serial port I/O operations.
///
/// Covers the data path (raw bytes) and the control path (modem lines).
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the current bytes available to read (if supported).
    fn bytes_to_read(&self) -> Option<usize> {
        None
    }

    /// Drop everything received but not yet read.
    fn discard_input(&mut self) -> Result<(), PortError>;

    /// Sample CD, DSR, CTS and RI.
    fn read_input_lines(&mut self) -> Result<InputLines, PortError>;

    /// Assert (`true`) or deassert (`false`) an output line.
    fn write_output_line(&mut self, line: OutputLine, level: bool) -> Result<(), PortError>;

    /// Level of an output line as the driver last accepted it.
    fn output_line_echo(&mut self, line: OutputLine) -> Result<bool, PortError>;
}

/// Something that can turn a device identifier into an open adapter.
pub trait PortOpener: Send + Sync {
    /// Open `device` with the given configuration.
    fn open(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(100));
    }
}
