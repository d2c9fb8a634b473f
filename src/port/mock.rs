//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates modem control lines and the
//! data path without requiring actual hardware, plus a `MockPortRegistry`
//! that hands mock ports out by name the way the OS hands out devices.

use super::error::PortError;
use super::lines::{InputLines, OutputLine};
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// What a mock does with bytes written to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EchoMode {
    /// Written bytes vanish (TX and RX not connected).
    #[default]
    None,
    /// Written bytes come straight back on RX (loopback plug fitted).
    Loopback,
    /// Every write is answered with these bytes instead.
    Reply(Vec<u8>),
}

/// Inner state of the mock port, shared by every clone.
#[derive(Debug, Default)]
struct MockPortState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all bytes written to the port.
    write_log: Vec<Vec<u8>>,
    /// Simulated input line levels.
    inputs: InputLines,
    /// Output line levels as last accepted.
    dtr: bool,
    rts: bool,
    /// Log of every accepted output line change.
    line_log: Vec<(OutputLine, bool)>,
    echo: EchoMode,
    /// Whether the next write should time out.
    write_timeout_pending: bool,
    /// Number of upcoming output line writes that should fail.
    line_write_failures: u32,
    /// Once set, every operation fails as if the cable was pulled.
    disconnected: bool,
    /// Configured timeout duration.
    timeout: Duration,
    /// Handles currently held through a `MockPortRegistry`.
    open_handles: usize,
}

impl MockPortState {
    fn check_connected(&self) -> Result<(), PortError> {
        if self.disconnected {
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }
        Ok(())
    }
}

/// Mock serial port implementation for testing.
///
/// This implementation allows you to:
/// - Drive the input lines (CD, DSR, CTS, RI) from the test
/// - Inspect output line changes and written data
/// - Fit a virtual loopback plug or script replies
/// - Simulate timeouts, failed line writes and unplugging
///
/// Clones share state, so a test can keep one clone while the code under
/// test owns another.
///
/// # Example
/// ```
/// use rs232_tester::port::{EchoMode, MockSerialPort, OutputLine, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.set_echo(EchoMode::Loopback);
/// port.write_bytes(&[0x55]).unwrap();
///
/// let mut buffer = [0u8; 4];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], &[0x55]);
///
/// port.write_output_line(OutputLine::Dtr, false).unwrap();
/// assert!(!port.output_level(OutputLine::Dtr));
/// ```
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    /// The internal state, shared by every clone.
    state: Arc<Mutex<MockPortState>>,
    /// Set on clones handed out by a registry; releases the handle on drop.
    owns_handle: bool,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    ///
    /// DTR and RTS start asserted, like a freshly opened real port.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_millis(100),
                dtr: true,
                rts: true,
                ..Default::default()
            })),
            owns_handle: false,
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Set the simulated input line levels.
    pub fn set_inputs(&self, inputs: InputLines) {
        self.state.lock().inputs = inputs;
    }

    /// Change how written bytes are echoed back.
    pub fn set_echo(&self, echo: EchoMode) {
        self.state.lock().echo = echo;
    }

    /// Make the next write time out with nothing accepted.
    pub fn set_write_timeout(&self) {
        self.state.lock().write_timeout_pending = true;
    }

    /// Make the next `count` output line writes fail.
    pub fn fail_line_writes(&self, count: u32) {
        self.state.lock().line_write_failures = count;
    }

    /// Simulate the device being unplugged (or plugged back in).
    pub fn set_disconnected(&self, disconnected: bool) {
        self.state.lock().disconnected = disconnected;
    }

    /// Current level of an output line.
    pub fn output_level(&self, line: OutputLine) -> bool {
        let state = self.state.lock();
        match line {
            OutputLine::Dtr => state.dtr,
            OutputLine::Rts => state.rts,
        }
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Get a copy of every accepted output line change.
    pub fn get_line_log(&self) -> Vec<(OutputLine, bool)> {
        self.state.lock().line_log.clone()
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Number of registry handles currently open on this port.
    pub fn open_handles(&self) -> usize {
        self.state.lock().open_handles
    }

    fn handle(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            owns_handle: true,
        }
    }
}

impl Clone for MockSerialPort {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            owns_handle: false,
        }
    }
}

impl Drop for MockSerialPort {
    fn drop(&mut self) {
        if self.owns_handle {
            let mut state = self.state.lock();
            state.open_handles = state.open_handles.saturating_sub(1);
        }
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        state.check_connected()?;

        if state.write_timeout_pending {
            state.write_timeout_pending = false;
            return Err(PortError::timeout(state.timeout));
        }

        state.write_log.push(data.to_vec());
        match state.echo.clone() {
            EchoMode::None => {}
            EchoMode::Loopback => state.read_queue.extend(data),
            EchoMode::Reply(reply) => state.read_queue.extend(reply),
        }

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        state.check_connected()?;

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            // Same outcome as a real port whose read timeout expired.
            Err(PortError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn bytes_to_read(&self) -> Option<usize> {
        Some(self.state.lock().read_queue.len())
    }

    fn discard_input(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.check_connected()?;
        state.read_queue.clear();
        Ok(())
    }

    fn read_input_lines(&mut self) -> Result<InputLines, PortError> {
        let state = self.state.lock();
        state.check_connected()?;
        Ok(state.inputs)
    }

    fn write_output_line(&mut self, line: OutputLine, level: bool) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.check_connected()?;

        if state.line_write_failures > 0 {
            state.line_write_failures -= 1;
            return Err(PortError::Io(io::Error::other(format!(
                "failed to set {line}"
            ))));
        }

        match line {
            OutputLine::Dtr => state.dtr = level,
            OutputLine::Rts => state.rts = level,
        }
        state.line_log.push((line, level));
        Ok(())
    }

    fn output_line_echo(&mut self, line: OutputLine) -> Result<bool, PortError> {
        let state = self.state.lock();
        state.check_connected()?;
        Ok(match line {
            OutputLine::Dtr => state.dtr,
            OutputLine::Rts => state.rts,
        })
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .field("owns_handle", &self.owns_handle)
            .finish()
    }
}

/// A fake device table: names map to mock ports.
///
/// Opening an unknown name fails with `NotFound`; opening a port that already
/// has an open handle fails with `Busy`, mirroring exclusive tty access.
#[derive(Debug, Clone, Default)]
pub struct MockPortRegistry {
    ports: Arc<Mutex<HashMap<String, MockSerialPort>>>,
}

impl MockPortRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device and return a clone of it for the test to steer.
    pub fn add(&self, name: impl Into<String>) -> MockSerialPort {
        let name = name.into();
        let port = MockSerialPort::new(name.clone());
        self.ports.lock().insert(name, port.clone());
        port
    }

    /// Remove a device, as if it had been unplugged before opening.
    pub fn remove(&self, name: &str) -> Option<MockSerialPort> {
        self.ports.lock().remove(name)
    }

    /// Names of all registered devices, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ports.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Total open handles across every registered device.
    pub fn open_handles(&self) -> usize {
        self.ports.lock().values().map(MockSerialPort::open_handles).sum()
    }
}

impl PortOpener for MockPortRegistry {
    fn open(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let ports = self.ports.lock();
        let port = ports.get(device).ok_or_else(|| PortError::not_found(device))?;

        let mut state = port.state.lock();
        if state.open_handles > 0 {
            return Err(PortError::busy(device));
        }
        state.open_handles += 1;
        state.timeout = config.timeout;
        drop(state);

        Ok(Box::new(port.handle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_empty_read_times_out() {
        let mut port = MockSerialPort::new("MOCK0");
        let mut buffer = [0u8; 10];

        let err = port.read_bytes(&mut buffer).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_echo_modes() {
        let mut port = MockSerialPort::new("MOCK0");
        let mut buffer = [0u8; 8];

        port.write_bytes(&[0x55]).unwrap();
        assert_eq!(port.available_bytes(), 0);

        port.set_echo(EchoMode::Loopback);
        port.write_bytes(&[0x55]).unwrap();
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], &[0x55]);

        port.set_echo(EchoMode::Reply(vec![0x41]));
        port.write_bytes(&[0x55]).unwrap();
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], &[0x41]);

        assert_eq!(port.get_write_log().len(), 3);
    }

    #[test]
    fn test_discard_input_empties_queue() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(&[0x41; 300]);

        port.discard_input().unwrap();
        assert_eq!(port.available_bytes(), 0);
        assert!(port.read_bytes(&mut [0u8; 4]).unwrap_err().is_timeout());
    }

    #[test]
    fn test_write_timeout_is_one_shot() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_write_timeout();

        assert!(matches!(port.write_bytes(b"x"), Err(PortError::Timeout(_))));
        assert_eq!(port.write_bytes(b"x").unwrap(), 1);
    }

    #[test]
    fn test_input_lines_follow_test_settings() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_inputs(InputLines {
            cd: true,
            dsr: false,
            cts: true,
            ri: false,
        });

        let lines = port.read_input_lines().unwrap();
        assert!(lines.cd && lines.cts);
        assert!(!lines.dsr && !lines.ri);
    }

    #[test]
    fn test_failed_line_write_keeps_previous_level() {
        let mut port = MockSerialPort::new("MOCK0");
        port.fail_line_writes(1);

        assert!(port.write_output_line(OutputLine::Rts, false).is_err());
        assert!(port.output_line_echo(OutputLine::Rts).unwrap());

        port.write_output_line(OutputLine::Rts, false).unwrap();
        assert!(!port.output_line_echo(OutputLine::Rts).unwrap());
        assert_eq!(port.get_line_log(), vec![(OutputLine::Rts, false)]);
    }

    #[test]
    fn test_disconnect_fails_everything() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_disconnected(true);

        assert!(port.read_input_lines().is_err());
        assert!(port.write_bytes(b"x").is_err());
        assert!(port.output_line_echo(OutputLine::Dtr).is_err());
        assert!(!port.read_bytes(&mut [0u8; 1]).unwrap_err().is_timeout());
    }

    #[test]
    fn test_registry_open_busy_and_release() {
        let registry = MockPortRegistry::new();
        let port = registry.add("/dev/ttyMOCK0");
        let config = PortConfiguration::default();

        let handle = registry.open("/dev/ttyMOCK0", &config).unwrap();
        assert_eq!(port.open_handles(), 1);
        assert!(matches!(
            registry.open("/dev/ttyMOCK0", &config),
            Err(PortError::Busy(_))
        ));

        drop(handle);
        assert_eq!(port.open_handles(), 0);
        assert!(registry.open("/dev/ttyMOCK0", &config).is_ok());
    }

    #[test]
    fn test_registry_unknown_device() {
        let registry = MockPortRegistry::new();
        let result = registry.open("nonexistent-device", &PortConfiguration::default());
        assert!(matches!(result, Err(PortError::NotFound(_))));
        assert_eq!(registry.open_handles(), 0);
    }

    #[test]
    fn test_clones_do_not_release_handles() {
        let registry = MockPortRegistry::new();
        let port = registry.add("A");
        let handle = registry.open("A", &PortConfiguration::default()).unwrap();

        drop(port.clone());
        assert_eq!(port.open_handles(), 1);
        drop(handle);
        assert_eq!(port.open_handles(), 0);
    }
}
