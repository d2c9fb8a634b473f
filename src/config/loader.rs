//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "RS232_TESTER";

/// Config file name
const CONFIG_FILE_NAME: &str = "rs232-tester.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "RS232_TESTER_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `RS232_TESTER_CONFIG` environment variable (explicit path)
    /// 2. `./rs232-tester.toml` (current directory)
    /// 3. the platform config directory (`~/.config/rs232-tester/` on Linux,
    ///    `%APPDATA%\rs232-tester\config\` on Windows)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values; the result is validated.
    pub fn load() -> ConfigResult<Self> {
        match resolve_config_path() {
            Some(path) => Self::load_from(path),
            None => {
                let mut config = Config::default();
                apply_env_overrides(&mut config, env_lookup)?;
                config.validate()?;
                Ok(Self {
                    config_path: None,
                    config,
                })
            }
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config, env_lookup)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|p| p.exists())
}

/// Get the platform config directory for this application.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rs232-tester").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default config file path in the platform config directory.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

fn parse_var<T: FromStr>(var: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}: '{value}'")))
}

/// Accepts decimal or `0x`-prefixed hex.
fn parse_byte(var: &str, value: &str) -> ConfigResult<u8> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ConfigError::env_parse(var, format!("Invalid byte: '{value}'")))
}

/// Apply environment variable overrides to the configuration.
///
/// Variables follow the pattern `RS232_TESTER_<SECTION>_<KEY>`, e.g.
/// `RS232_TESTER_POLLING_INTERVAL_MS=20` or `RS232_TESTER_TUI_THEME=nord`.
pub(crate) fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<()> {
    let var = |key: &str| format!("{ENV_PREFIX}_{key}");

    let name = var("POLLING_INTERVAL_MS");
    if let Some(val) = lookup(&name) {
        config.polling.interval_ms = parse_var(&name, &val, "interval")?;
    }
    let name = var("POLLING_LOOPBACK_BYTE");
    if let Some(val) = lookup(&name) {
        config.polling.loopback_byte = parse_byte(&name, &val)?;
    }
    let name = var("POLLING_INITIAL_DTR");
    if let Some(val) = lookup(&name) {
        config.polling.initial_dtr = parse_var(&name, &val, "boolean")?;
    }
    let name = var("POLLING_INITIAL_RTS");
    if let Some(val) = lookup(&name) {
        config.polling.initial_rts = parse_var(&name, &val, "boolean")?;
    }

    if let Some(val) = lookup(&var("TUI_THEME")) {
        config.tui.theme = val;
    }
    let name = var("TUI_REFRESH_RATE_HZ");
    if let Some(val) = lookup(&name) {
        config.tui.refresh_rate_hz = parse_var(&name, &val, "refresh rate")?;
    }

    if let Some(val) = lookup(&var("LOGGING_LEVEL")) {
        config.logging.level = val;
    }
    let name = var("LOGGING_FORMAT");
    if let Some(val) = lookup(&name) {
        config.logging.format = parse_var(&name, &val, "log format")?;
    }
    if let Some(val) = lookup(&var("LOGGING_FILE")) {
        config.logging.file = Some(PathBuf::from(val));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::env;
    use std::io::Write;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            overrides(&[
                ("RS232_TESTER_POLLING_INTERVAL_MS", "20"),
                ("RS232_TESTER_POLLING_LOOPBACK_BYTE", "0xAA"),
                ("RS232_TESTER_POLLING_INITIAL_RTS", "false"),
                ("RS232_TESTER_TUI_THEME", "nord"),
                ("RS232_TESTER_LOGGING_FORMAT", "compact"),
            ]),
        )
        .unwrap();

        assert_eq!(config.polling.interval_ms, 20);
        assert_eq!(config.polling.loopback_byte, 0xAA);
        assert!(!config.polling.initial_rts);
        assert_eq!(config.tui.theme, "nord");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_bad_env_value_names_variable() {
        let mut config = Config::default();
        let err = apply_env_overrides(
            &mut config,
            overrides(&[("RS232_TESTER_POLLING_LOOPBACK_BYTE", "256")]),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::EnvParseError { ref var, .. } if var == "RS232_TESTER_POLLING_LOOPBACK_BYTE"
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[polling]\ninterval_ms = 100\n\n[tui]\ntheme = \"light\"").unwrap();

        env::set_var("RS232_TESTER_TUI_THEME", "nord");
        let loader = ConfigLoader::load_from(file.path());
        env::remove_var("RS232_TESTER_TUI_THEME");

        let loader = loader.unwrap();
        assert_eq!(loader.config().polling.interval_ms, 100);
        assert_eq!(loader.config().tui.theme, "nord");
        assert_eq!(loader.config_path.as_deref(), Some(file.path()));
    }

    #[test]
    #[serial]
    fn test_load_rejects_zero_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[polling]\ninterval_ms = 0").unwrap();

        let err = ConfigLoader::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    #[serial]
    fn test_missing_sections_take_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tui]\ntheme = \"light\"").unwrap();

        let config = ConfigLoader::load_from(file.path()).unwrap().into_config();
        assert_eq!(config.polling, Config::default().polling);
        assert_eq!(config.tui.theme, "light");
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load_from(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
