//! Line-state snapshots and loopback classification.

use crate::port::InputLines;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default byte written to TX during the loopback test (`0b0101_0101`).
pub const DEFAULT_LOOPBACK_BYTE: u8 = 0x55;

/// Outcome of one loopback exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RxStatus {
    /// Nothing came back (or TX test is off).
    #[default]
    Silent,
    /// Exactly the test byte came back.
    Match,
    /// Something came back, but not the test byte.
    Mismatch,
}

impl RxStatus {
    /// Classify bytes read back after writing `test_byte`.
    ///
    /// ```
    /// use rs232_tester::controller::RxStatus;
    ///
    /// assert_eq!(RxStatus::classify(&[], 0x55), RxStatus::Silent);
    /// assert_eq!(RxStatus::classify(&[0x55], 0x55), RxStatus::Match);
    /// assert_eq!(RxStatus::classify(&[0x41], 0x55), RxStatus::Mismatch);
    /// ```
    pub fn classify(received: &[u8], test_byte: u8) -> Self {
        match received {
            [] => Self::Silent,
            [byte] if *byte == test_byte => Self::Match,
            _ => Self::Mismatch,
        }
    }
}

/// Every line level observed in one sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    /// Cycle counter since the session was opened, starting at 1.
    pub sequence: u64,
    /// CD, DSR, CTS, RI.
    #[serde(flatten)]
    pub inputs: InputLines,
    /// DTR as echoed by the driver.
    pub dtr: bool,
    /// RTS as echoed by the driver.
    pub rts: bool,
    /// Whether the loopback test ran this cycle.
    pub tx_enabled: bool,
    /// Loopback result.
    pub rx: RxStatus,
}

impl LineSnapshot {
    /// Whether any byte was received this cycle.
    pub fn rx_detected(&self) -> bool {
        self.rx != RxStatus::Silent
    }

    /// Whether the received bytes were exactly the test byte.
    pub fn rx_match(&self) -> bool {
        self.rx == RxStatus::Match
    }
}

impl fmt::Display for RxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Silent => "silent",
            Self::Match => "match",
            Self::Mismatch => "mismatch",
        })
    }
}

/// One-line summary: `#12 CD=1 DSR=0 CTS=1 RI=0 DTR=1 RTS=0 TX=on RX=match`.
impl fmt::Display for LineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |level: bool| u8::from(level);
        write!(
            f,
            "#{} CD={} DSR={} CTS={} RI={} DTR={} RTS={} TX={} RX={}",
            self.sequence,
            bit(self.inputs.cd),
            bit(self.inputs.dsr),
            bit(self.inputs.cts),
            bit(self.inputs.ri),
            bit(self.dtr),
            bit(self.rts),
            if self.tx_enabled { "on" } else { "off" },
            self.rx,
        )
    }
}
