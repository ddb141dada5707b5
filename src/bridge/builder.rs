//! Builder pattern for bridge configuration.
//!
//! Provides a fluent API for configuring and starting [`Bridge`] instances.
//!
//! # Example
//!
//! ```no_run
//! use serial_bridge::Bridge;
//!
//! # async fn example() -> serial_bridge::Result<()> {
//! let bridge = Bridge::builder()
//!     .config_dir("/etc/janus")
//!     .port_name("/dev/ttyACM1")
//!     .start()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{SerialTransport, Transport};

use super::config::{BridgeConfig, Overrides};
use super::core::Bridge;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`] instance.
///
/// Use [`Bridge::builder()`] to create a new builder. Values set on the
/// builder take precedence over the configuration file.
#[derive(Debug, Default, Clone)]
pub struct BridgeBuilder {
    /// Directory holding the configuration file.
    config_dir: Option<PathBuf>,
    /// Base configuration used instead of the file.
    base: Option<BridgeConfig>,
    /// Per-key overrides.
    overrides: Overrides,
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory the configuration file is read from.
    #[inline]
    #[must_use]
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Starts from an explicit configuration instead of the file.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.base = Some(config);
        self
    }

    /// Sets the serial device path.
    #[inline]
    #[must_use]
    pub fn port_name(mut self, port_name: impl Into<String>) -> Self {
        self.overrides.portname = Some(port_name.into());
        self
    }

    /// Sets the baud rate.
    #[inline]
    #[must_use]
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.overrides.baudrate = Some(baud_rate);
        self
    }

    /// Sets the minimum partial answer length.
    #[inline]
    #[must_use]
    pub fn vmin(mut self, vmin: u8) -> Self {
        self.overrides.vmin = Some(vmin);
        self
    }

    /// Sets the inter-character timeout in deciseconds.
    #[inline]
    #[must_use]
    pub fn vtime(mut self, vtime: u8) -> Self {
        self.overrides.vtime = Some(vtime);
        self
    }

    /// Sets the device answer timeout.
    #[inline]
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.overrides.read_timeout_ms = Some(millis(timeout));
        self
    }

    /// Sets the wait after opening the port.
    #[inline]
    #[must_use]
    pub fn reset_delay(mut self, delay: Duration) -> Self {
        self.overrides.reset_delay_ms = Some(millis(delay));
        self
    }

    /// Sets the queue poll interval.
    #[inline]
    #[must_use]
    pub fn queue_poll(mut self, poll: Duration) -> Self {
        self.overrides.queue_poll_ms = Some(millis(poll));
        self
    }

    /// Sets the watchdog tick period.
    #[inline]
    #[must_use]
    pub fn watchdog_period(mut self, period: Duration) -> Self {
        self.overrides.watchdog_period_ms = Some(millis(period));
        self
    }

    /// Sets the retired-session grace period.
    #[inline]
    #[must_use]
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.overrides.grace_period_ms = Some(millis(grace));
        self
    }

    /// Resolves and validates the configuration without starting anything.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] / [`Error::Toml`] if the configuration file is unreadable
    /// - [`Error::Config`] if the resolved configuration is invalid
    pub fn build_config(&self) -> Result<BridgeConfig> {
        let mut config = match (&self.base, &self.config_dir) {
            (Some(base), _) => base.clone(),
            (None, Some(dir)) => BridgeConfig::load(dir)?,
            (None, None) => BridgeConfig::default(),
        };

        self.overrides.apply(&mut config);
        config.validate().map_err(Error::config)?;
        Ok(config)
    }

    /// Opens the serial device and starts the bridge.
    ///
    /// # Errors
    ///
    /// - Configuration errors from [`BridgeBuilder::build_config`]
    /// - [`Error::DeviceUnavailable`] if the device cannot be opened; no
    ///   background task is started in that case
    pub async fn start(self) -> Result<Bridge> {
        let config = self.build_config()?;
        let transport = SerialTransport::open(&config.line).await?;
        Bridge::start(config, Box::new(transport))
    }

    /// Starts the bridge over an already opened transport.
    ///
    /// # Errors
    ///
    /// Configuration errors from [`BridgeBuilder::build_config`].
    pub async fn start_with_transport(self, transport: impl Transport + 'static) -> Result<Bridge> {
        let config = self.build_config()?;
        Bridge::start(config, Box::new(transport))
    }
}

/// Duration to whole milliseconds, saturating.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    use crate::bridge::config::CONFIG_FILE_NAME;

    #[test]
    fn test_default_builder_yields_default_config() {
        let config = BridgeBuilder::new().build_config().expect("config");
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_overrides_apply() {
        let config = BridgeBuilder::new()
            .port_name("/dev/ttyS1")
            .baud_rate(19_200)
            .vmin(1)
            .vtime(5)
            .read_timeout(Duration::from_millis(900))
            .reset_delay(Duration::ZERO)
            .queue_poll(Duration::from_millis(10))
            .watchdog_period(Duration::from_millis(100))
            .grace_period(Duration::from_secs(1))
            .build_config()
            .expect("config");

        assert_eq!(config.line.port_name, "/dev/ttyS1");
        assert_eq!(config.line.baud_rate, 19_200);
        assert_eq!(config.line.vmin, 1);
        assert_eq!(config.line.vtime, 5);
        assert_eq!(config.line.read_timeout, Duration::from_millis(900));
        assert!(config.line.reset_delay.is_zero());
        assert_eq!(config.queue_poll, Duration::from_millis(10));
        assert_eq!(config.watchdog_period, Duration::from_millis(100));
        assert_eq!(config.grace_period, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides_beat_file() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[general]\nportname = \"/dev/ttyUSB0\"\nbaudrate = 57600\n",
        )
        .expect("write");

        let config = BridgeBuilder::new()
            .config_dir(dir.path())
            .baud_rate(115_200)
            .build_config()
            .expect("config");

        assert_eq!(config.line.port_name, "/dev/ttyUSB0");
        assert_eq!(config.line.baud_rate, 115_200);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = BridgeBuilder::new()
            .read_timeout(Duration::ZERO)
            .build_config()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_start_missing_device_fails() {
        let err = BridgeBuilder::new()
            .port_name("/dev/serial-bridge-missing")
            .reset_delay(Duration::ZERO)
            .start()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable { .. }));
    }
}
