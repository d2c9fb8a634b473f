//! TOML configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the first of:
//!
//! 1. `RS232_TESTER_CONFIG` environment variable (explicit path)
//! 2. `./rs232-tester.toml` (current directory)
//! 3. `rs232-tester.toml` in the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `RS232_TESTER_<SECTION>_<KEY>`:
//! - `RS232_TESTER_POLLING_INTERVAL_MS=20`
//! - `RS232_TESTER_POLLING_LOOPBACK_BYTE=0xA5`
//! - `RS232_TESTER_TUI_THEME=nord`
//! - `RS232_TESTER_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```no_run
//! use rs232_tester::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("sampling every {:?}", loader.config().polling.interval());
//! # Ok::<(), rs232_tester::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, PollingConfig, SerialConfig, TuiConfig};
