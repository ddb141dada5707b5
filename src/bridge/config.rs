//! Bridge configuration.
//!
//! Configuration comes from an optional TOML file in the host's configuration
//! directory, with individual keys overridable through [`BridgeBuilder`].
//! A missing file means defaults.
//!
//! ```toml
//! [general]
//! portname = "/dev/ttyACM0"
//! baudrate = 9600
//! vmin = 12
//! vtime = 0
//! read_timeout_ms = 2000
//! reset_delay_ms = 1000
//! queue_poll_ms = 50
//! watchdog_period_ms = 500
//! grace_period_ms = 5000
//! ```
//!
//! [`BridgeBuilder`]: super::BridgeBuilder

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::session::{DEFAULT_GRACE_PERIOD, DEFAULT_WATCHDOG_PERIOD};
use crate::transport::LineSettings;

// ============================================================================
// Constants
// ============================================================================

/// Configuration file name looked up in the configuration directory.
pub const CONFIG_FILE_NAME: &str = "janus.plugin.serial.toml";

/// Default bound on one wait for the next queued request.
pub const DEFAULT_QUEUE_POLL: Duration = Duration::from_millis(50);

// ============================================================================
// BridgeConfig
// ============================================================================

/// Resolved bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Serial line settings.
    pub line: LineSettings,

    /// Bound on one wait for the next queued request; also how quickly the
    /// worker notices shutdown.
    pub queue_poll: Duration,

    /// Watchdog tick period.
    pub watchdog_period: Duration,

    /// Age at which retired sessions are freed.
    pub grace_period: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            line: LineSettings::default(),
            queue_poll: DEFAULT_QUEUE_POLL,
            watchdog_period: DEFAULT_WATCHDOG_PERIOD,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl BridgeConfig {
    /// Loads `<dir>/janus.plugin.serial.toml`, or defaults if it is absent.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file exists but cannot be read
    /// - [`Error::Toml`] if the file is not valid TOML
    /// - [`Error::Config`] if a value is out of range
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE_NAME);

        if !path.exists() {
            info!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        debug!(path = %path.display(), "Loading configuration");
        let text = fs::read_to_string(&path)?;
        Self::from_toml_str(&text)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// - [`Error::Toml`] if the text is not valid TOML
    /// - [`Error::Config`] if a value is out of range
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut config = Self::default();
        file.general.apply(&mut config);
        config.validate().map_err(Error::config)?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.line.validate()?;
        if self.queue_poll.is_zero() {
            return Err("Queue poll interval must be greater than zero".to_string());
        }
        if self.watchdog_period.is_zero() {
            return Err("Watchdog period must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// File Layout
// ============================================================================

/// Top level of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    general: Overrides,
}

/// Individually optional configuration keys.
///
/// Used both for the `[general]` table and for builder overrides.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct Overrides {
    pub portname: Option<String>,
    pub baudrate: Option<u32>,
    pub vmin: Option<u8>,
    pub vtime: Option<u8>,
    pub read_timeout_ms: Option<u64>,
    pub reset_delay_ms: Option<u64>,
    pub queue_poll_ms: Option<u64>,
    pub watchdog_period_ms: Option<u64>,
    pub grace_period_ms: Option<u64>,
}

impl Overrides {
    /// Writes every set key into `config`.
    pub(crate) fn apply(&self, config: &mut BridgeConfig) {
        if let Some(portname) = &self.portname {
            config.line.port_name.clone_from(portname);
        }
        if let Some(baudrate) = self.baudrate {
            config.line.baud_rate = baudrate;
        }
        if let Some(vmin) = self.vmin {
            config.line.vmin = vmin;
        }
        if let Some(vtime) = self.vtime {
            config.line.vtime = vtime;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.line.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.reset_delay_ms {
            config.line.reset_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.queue_poll_ms {
            config.queue_poll = Duration::from_millis(ms);
        }
        if let Some(ms) = self.watchdog_period_ms {
            config.watchdog_period = Duration::from_millis(ms);
        }
        if let Some(ms) = self.grace_period_ms {
            config.grace_period = Duration::from_millis(ms);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.line.port_name, "/dev/ttyACM0");
        assert_eq!(config.line.baud_rate, 9600);
        assert_eq!(config.queue_poll, Duration::from_millis(50));
        assert_eq!(config.watchdog_period, Duration::from_millis(500));
        assert_eq!(config.grace_period, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let config = BridgeConfig::load(dir.path()).expect("load");
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().expect("tempdir");
        let mut file = fs::File::create(dir.path().join(CONFIG_FILE_NAME)).expect("create");
        writeln!(
            file,
            "[general]\nportname = \"/dev/ttyUSB3\"\nbaudrate = 115200\nvtime = 2\ngrace_period_ms = 1000"
        )
        .expect("write");

        let config = BridgeConfig::load(dir.path()).expect("load");
        assert_eq!(config.line.port_name, "/dev/ttyUSB3");
        assert_eq!(config.line.baud_rate, 115_200);
        assert_eq!(config.line.vtime, 2);
        assert_eq!(config.line.vmin, 12);
        assert_eq!(config.grace_period, Duration::from_secs(1));
    }

    #[test]
    fn test_empty_text_is_default() {
        let config = BridgeConfig::from_toml_str("").expect("parse");
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = BridgeConfig::from_toml_str("[general]\nevents = false\n").expect("parse");
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = BridgeConfig::from_toml_str("[general\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = BridgeConfig::from_toml_str("[general]\nbaudrate = \"fast\"\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = BridgeConfig::from_toml_str("[general]\nbaudrate = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = BridgeConfig::from_toml_str("[general]\nqueue_poll_ms = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
