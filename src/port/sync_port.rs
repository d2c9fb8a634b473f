//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own
//! `SerialPortAdapter` trait for dependency injection and testing.

use super::error::PortError;
use super::lines::{InputLines, OutputLine};
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use std::io::{Read, Write};
use tracing::debug;

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
    /// Last DTR level the driver accepted.
    dtr: bool,
    /// Last RTS level the driver accepted.
    rts: bool,
}

impl SyncSerialPort {
    /// Open a serial port with the given configuration.
    ///
    /// The port is opened 8N1 without flow control so the tester, not the
    /// driver, owns RTS.
    ///
    /// # Example
    /// ```no_run
    /// use rs232_tester::port::{PortConfiguration, SyncSerialPort};
    ///
    /// let port = SyncSerialPort::open("/dev/ttyUSB0", &PortConfiguration::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .flow_control(serialport::FlowControl::None)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(config.timeout)
            .open()
            .map_err(|e| PortError::from_open_error(port_name, e))?;

        debug!(port = port_name, baud = config.baud_rate, "serial port opened");

        // Most drivers raise both lines on open.
        Ok(Self {
            port,
            name: port_name.to_string(),
            dtr: true,
            rts: true,
        })
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn bytes_to_read(&self) -> Option<usize> {
        self.port.bytes_to_read().ok().map(|n| n as usize)
    }

    fn discard_input(&mut self) -> Result<(), PortError> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }

    fn read_input_lines(&mut self) -> Result<InputLines, PortError> {
        Ok(InputLines {
            cd: self.port.read_carrier_detect()?,
            dsr: self.port.read_data_set_ready()?,
            cts: self.port.read_clear_to_send()?,
            ri: self.port.read_ring_indicator()?,
        })
    }

    fn write_output_line(&mut self, line: OutputLine, level: bool) -> Result<(), PortError> {
        match line {
            OutputLine::Dtr => {
                self.port.write_data_terminal_ready(level)?;
                self.dtr = level;
            }
            OutputLine::Rts => {
                self.port.write_request_to_send(level)?;
                self.rts = level;
            }
        }
        Ok(())
    }

    fn output_line_echo(&mut self, line: OutputLine) -> Result<bool, PortError> {
        // serialport has no DTR/RTS readback; report what the driver accepted.
        Ok(match line {
            OutputLine::Dtr => self.dtr,
            OutputLine::Rts => self.rts,
        })
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .field("dtr", &self.dtr)
            .field("rts", &self.rts)
            .finish()
    }
}

/// Opens real devices through the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(device, config)?))
    }
}
