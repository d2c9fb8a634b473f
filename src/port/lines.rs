//! RS-232 control line vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Levels of the four hardware input lines, as reported by the adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLines {
    /// Carrier Detect (DB-9 pin 1).
    pub cd: bool,
    /// Data Set Ready (DB-9 pin 6).
    pub dsr: bool,
    /// Clear To Send (DB-9 pin 8).
    pub cts: bool,
    /// Ring Indicator (DB-9 pin 9).
    pub ri: bool,
}

/// Software-driven output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLine {
    /// Data Terminal Ready (DB-9 pin 4).
    Dtr,
    /// Request To Send (DB-9 pin 7).
    Rts,
}

impl OutputLine {
    /// Both output lines, in pin order.
    pub const ALL: [OutputLine; 2] = [OutputLine::Dtr, OutputLine::Rts];

    /// DB-9 pin carrying this line.
    pub fn pin(self) -> u8 {
        match self {
            Self::Dtr => 4,
            Self::Rts => 7,
        }
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dtr => f.write_str("DTR"),
            Self::Rts => f.write_str("RTS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_line_display_and_pins() {
        assert_eq!(OutputLine::Dtr.to_string(), "DTR");
        assert_eq!(OutputLine::Rts.to_string(), "RTS");
        assert_eq!(OutputLine::Dtr.pin(), 4);
        assert_eq!(OutputLine::Rts.pin(), 7);
    }

    #[test]
    fn test_input_lines_default_all_low() {
        let lines = InputLines::default();
        assert!(!lines.cd && !lines.dsr && !lines.cts && !lines.ri);
    }
}
