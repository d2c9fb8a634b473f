//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes.

use super::error::{ConfigError, ConfigResult};
use crate::controller::{DEFAULT_LOOPBACK_BYTE, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device naming
    pub serial: SerialConfig,
    /// Sampling loop
    pub polling: PollingConfig,
    /// Terminal front end
    pub tui: TuiConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the controller or front end cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::validation(
                "polling.interval_ms",
                "must be greater than zero",
            ));
        }
        if self.tui.refresh_rate_hz == 0 {
            return Err(ConfigError::validation(
                "tui.refresh_rate_hz",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Serial device section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Short names for device paths, e.g. `bench = "/dev/ttyUSB0"`
    pub port_aliases: HashMap<String, String>,
}

impl SerialConfig {
    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// Sampling loop section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Time between cycle starts in milliseconds
    pub interval_ms: u64,
    /// Byte written during the loopback test
    pub loopback_byte: u8,
    /// DTR level applied when sampling starts
    pub initial_dtr: bool,
    /// RTS level applied when sampling starts
    pub initial_rts: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            loopback_byte: DEFAULT_LOOPBACK_BYTE,
            initial_dtr: true,
            initial_rts: true,
        }
    }
}

impl PollingConfig {
    /// Cycle interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// TUI configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuiConfig {
    /// Theme name: "dark", "light" or "nord"
    pub theme: String,
    /// Redraw rate in Hz
    pub refresh_rate_hz: u32,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            refresh_rate_hz: 30,
        }
    }
}

impl TuiConfig {
    /// Get refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.refresh_rate_hz.max(1)))
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Log file path (optional)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.interval(), Duration::from_millis(50));
        assert_eq!(config.polling.loopback_byte, 0x55);
        assert!(config.polling.initial_dtr && config.polling.initial_rts);
        assert_eq!(config.tui.theme, "dark");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("bench".to_string(), "/dev/ttyUSB0".to_string());

        assert_eq!(config.resolve_port("bench"), "/dev/ttyUSB0");
        assert_eq!(config.resolve_port("COM5"), "COM5");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[polling]"));
        assert!(toml_str.contains("[logging]"));

        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let toml_str = r#"
            [polling]
            interval_ms = 20
            loopback_byte = 0xA5

            [logging]
            format = "json"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.polling.interval_ms, 20);
        assert_eq!(config.polling.loopback_byte, 0xA5);
        assert!(config.polling.initial_dtr);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.tui.refresh_rate_hz, 30);
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = Config::default();
        config.polling.interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { ref key, .. }) if key == "polling.interval_ms"
        ));

        let mut config = Config::default();
        config.tui.refresh_rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
