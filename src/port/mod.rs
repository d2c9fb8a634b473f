//! Port abstraction layer for serial communication.
//!
//! Provides the adapter traits, the `serialport`-backed implementation and a
//! mock, so the session layer above can be tested without hardware.

pub mod error;
pub mod lines;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use lines::{InputLines, OutputLine};
pub use mock::{EchoMode, MockPortRegistry, MockSerialPort};
pub use sync_port::{SyncSerialPort, SystemPortOpener};
pub use traits::*;
