//! Port session: exclusive ownership of one open serial device.
//!
//! Every primitive here is bounded by the port timeout fixed at open time.
//! A timeout that moved no bytes is reported as zero bytes, never as an
//! error; any other adapter failure becomes [`TesterError::Io`].

use crate::error::{TesterError, TesterResult};
use crate::port::{InputLines, OutputLine, PortConfiguration, PortOpener, SerialPortAdapter};
use tracing::{debug, info};

/// Largest read performed by a single `try_read_available` call.
const READ_CHUNK: usize = 256;

/// One exclusively-owned serial connection.
#[derive(Debug)]
pub struct PortSession {
    device: String,
    port: Option<Box<dyn SerialPortAdapter>>,
}

impl PortSession {
    /// Open `device` through `opener`.
    ///
    /// # Errors
    ///
    /// - `TesterError::Connection` if the device is missing, busy or refused
    pub fn open(
        opener: &dyn PortOpener,
        device: &str,
        config: &PortConfiguration,
    ) -> TesterResult<Self> {
        let port = opener
            .open(device, config)
            .map_err(|e| TesterError::connection(device, e))?;

        info!(device, timeout_ms = config.timeout.as_millis() as u64, "session opened");

        Ok(Self {
            device: device.to_string(),
            port: Some(port),
        })
    }

    /// Release the OS handle.
    ///
    /// # Errors
    ///
    /// - `TesterError::NotOpen` if the session was already closed
    pub fn close(&mut self) -> TesterResult<()> {
        match self.port.take() {
            Some(port) => {
                drop(port);
                info!(device = %self.device, "session closed");
                Ok(())
            }
            None => Err(TesterError::NotOpen),
        }
    }

    /// Whether the handle is still held.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Identifier the session was opened with.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Sample CD, DSR, CTS and RI.
    pub fn read_input_lines(&mut self) -> TesterResult<InputLines> {
        let device = &self.device;
        let port = self.port.as_mut().ok_or(TesterError::NotOpen)?;
        port.read_input_lines()
            .map_err(|e| TesterError::io(device.as_str(), e))
    }

    /// Drive an output line. On failure the line keeps its previous level.
    pub fn set_output_line(&mut self, line: OutputLine, level: bool) -> TesterResult<()> {
        let device = &self.device;
        let port = self.port.as_mut().ok_or(TesterError::NotOpen)?;
        port.write_output_line(line, level)
            .map_err(|e| TesterError::io(device.as_str(), e))?;
        debug!(device = %device, %line, level, "output line set");
        Ok(())
    }

    /// Level of an output line as reported by the driver.
    pub fn read_output_line_echo(&mut self, line: OutputLine) -> TesterResult<bool> {
        let device = &self.device;
        let port = self.port.as_mut().ok_or(TesterError::NotOpen)?;
        port.output_line_echo(line)
            .map_err(|e| TesterError::io(device.as_str(), e))
    }

    /// Write without blocking past the write timeout.
    ///
    /// Returns the number of bytes accepted; a timeout yields `Ok(0)`.
    pub fn try_write(&mut self, data: &[u8]) -> TesterResult<usize> {
        let device = &self.device;
        let port = self.port.as_mut().ok_or(TesterError::NotOpen)?;
        match port.write_bytes(data) {
            Ok(n) => Ok(n),
            Err(e) if e.is_timeout() => {
                debug!(device = %device, "write timed out, nothing accepted");
                Ok(0)
            }
            Err(e) => Err(TesterError::io(device.as_str(), e)),
        }
    }

    /// Collect whatever the port has received, waiting at most the read
    /// timeout for the first byte. An empty result is normal.
    pub fn try_read_available(&mut self) -> TesterResult<Vec<u8>> {
        let device = &self.device;
        let port = self.port.as_mut().ok_or(TesterError::NotOpen)?;

        let wanted = port
            .bytes_to_read()
            .filter(|&n| n > 0)
            .map_or(READ_CHUNK, |n| n.min(READ_CHUNK));
        let mut buffer = vec![0u8; wanted];

        match port.read_bytes(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(e) if e.is_timeout() => Ok(Vec::new()),
            Err(e) => Err(TesterError::io(device.as_str(), e)),
        }
    }

    /// Throw away received bytes nobody has read yet.
    pub fn discard_input(&mut self) -> TesterResult<()> {
        let device = &self.device;
        let port = self.port.as_mut().ok_or(TesterError::NotOpen)?;
        port.discard_input()
            .map_err(|e| TesterError::io(device.as_str(), e))
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        if self.port.is_some() {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{EchoMode, MockPortRegistry, MockSerialPort};

    fn open_mock(name: &str) -> (MockPortRegistry, MockSerialPort, PortSession) {
        let registry = MockPortRegistry::new();
        let port = registry.add(name);
        let session = PortSession::open(&registry, name, &PortConfiguration::default()).unwrap();
        (registry, port, session)
    }

    #[test]
    fn test_open_unknown_device_is_connection_error() {
        let registry = MockPortRegistry::new();
        let err = PortSession::open(&registry, "nonexistent-device", &PortConfiguration::default())
            .unwrap_err();
        assert!(matches!(err, TesterError::Connection { ref device, .. } if device == "nonexistent-device"));
    }

    #[test]
    fn test_operations_after_close_fail_not_open() {
        let (_registry, port, mut session) = open_mock("MOCK0");
        session.close().unwrap();

        assert!(!session.is_open());
        assert_eq!(port.open_handles(), 0);
        assert!(matches!(session.read_input_lines(), Err(TesterError::NotOpen)));
        assert!(matches!(session.try_write(&[0x55]), Err(TesterError::NotOpen)));
        assert!(matches!(session.try_read_available(), Err(TesterError::NotOpen)));
        assert!(matches!(session.discard_input(), Err(TesterError::NotOpen)));
        assert!(matches!(
            session.set_output_line(OutputLine::Dtr, true),
            Err(TesterError::NotOpen)
        ));
        assert!(matches!(session.close(), Err(TesterError::NotOpen)));
    }

    #[test]
    fn test_write_timeout_is_zero_bytes() {
        let (_registry, port, mut session) = open_mock("MOCK0");
        port.set_write_timeout();

        assert_eq!(session.try_write(&[0x55]).unwrap(), 0);
        assert_eq!(session.try_write(&[0x55]).unwrap(), 1);
    }

    #[test]
    fn test_read_available_empty_and_loopback() {
        let (_registry, port, mut session) = open_mock("MOCK0");
        assert!(session.try_read_available().unwrap().is_empty());

        port.set_echo(EchoMode::Loopback);
        session.try_write(&[0x55]).unwrap();
        assert_eq!(session.try_read_available().unwrap(), vec![0x55]);
    }

    #[test]
    fn test_discard_input_drops_unread_bytes() {
        let (_registry, port, mut session) = open_mock("MOCK0");
        port.enqueue_read(&[0x41; 300]);

        assert_eq!(session.try_read_available().unwrap().len(), READ_CHUNK);
        session.discard_input().unwrap();
        assert_eq!(port.available_bytes(), 0);
        assert!(session.try_read_available().unwrap().is_empty());
    }

    #[test]
    fn test_output_echo_tracks_accepted_level() {
        let (_registry, port, mut session) = open_mock("MOCK0");

        session.set_output_line(OutputLine::Dtr, false).unwrap();
        assert!(!session.read_output_line_echo(OutputLine::Dtr).unwrap());

        port.fail_line_writes(1);
        assert!(session.set_output_line(OutputLine::Dtr, true).is_err());
        assert!(!session.read_output_line_echo(OutputLine::Dtr).unwrap());
    }

    #[test]
    fn test_unplugged_device_is_io_error() {
        let (_registry, port, mut session) = open_mock("MOCK0");
        port.set_disconnected(true);

        let err = session.read_input_lines().unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_drop_releases_handle() {
        let (_registry, port, session) = open_mock("MOCK0");
        assert_eq!(port.open_handles(), 1);
        drop(session);
        assert_eq!(port.open_handles(), 0);
    }
}
