//! Controller-level error taxonomy.
//!
//! `PortError` describes what went wrong at the adapter; `TesterError` says
//! what it means for the session: the device could not be opened, the line
//! died under an open session, or the caller broke the open/close contract.

use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for session and controller operations.
pub type TesterResult<T> = Result<T, TesterError>;

/// Unified error type for the tester core.
#[derive(Debug, Error)]
pub enum TesterError {
    /// The device could not be opened (missing, busy, permission denied).
    #[error("cannot open {device}: {source}")]
    Connection {
        device: String,
        #[source]
        source: PortError,
    },

    /// An operation needed an open session but none was open.
    #[error("no serial port is open")]
    NotOpen,

    /// `open` was requested while another session is still open.
    #[error("{0} is already open; close it first")]
    AlreadyOpen(String),

    /// The open line failed; the session has been torn down.
    #[error("I/O error on {device}: {source}")]
    Io {
        device: String,
        #[source]
        source: PortError,
    },

    /// The polling worker is gone.
    #[error("polling controller has shut down")]
    Shutdown,
}

impl TesterError {
    /// Wrap an adapter error raised while opening `device`.
    pub fn connection(device: impl Into<String>, source: PortError) -> Self {
        Self::Connection {
            device: device.into(),
            source,
        }
    }

    /// Wrap an adapter error raised on the open line of `device`.
    pub fn io(device: impl Into<String>, source: PortError) -> Self {
        match source {
            PortError::NotOpen => Self::NotOpen,
            source => Self::Io {
                device: device.into(),
                source,
            },
        }
    }

    /// Whether this error ended the session it happened on.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
