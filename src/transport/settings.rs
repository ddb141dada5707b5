//! Serial line discipline settings.
//!
//! The line always runs 8N1 without flow control in raw mode; what varies is
//! the device path, the baud rate and the read policy.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use serial_bridge::transport::LineSettings;
//!
//! let settings = LineSettings::new()
//!     .with_port_name("/dev/ttyUSB0")
//!     .with_baud_rate(115_200)
//!     .with_read_timeout(Duration::from_millis(500));
//!
//! assert!(settings.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default device path.
pub const DEFAULT_PORT_NAME: &str = "/dev/ttyACM0";

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default minimum answer length accepted on timeout (`VMIN`).
pub const DEFAULT_VMIN: u8 = 12;

/// Default inter-character timeout in deciseconds (`VTIME`).
pub const DEFAULT_VTIME: u8 = 0;

/// Default upper bound on waiting for one device answer.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Default wait for the microcontroller to reset after the port opens.
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(1);

/// Read slice used when `VTIME` is zero.
const DEFAULT_READ_SLICE: Duration = Duration::from_millis(50);

// ============================================================================
// LineSettings
// ============================================================================

/// Serial line configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSettings {
    /// Device path.
    pub port_name: String,

    /// Baud rate for both directions.
    pub baud_rate: u32,

    /// Bytes that must have arrived for a partial answer to be accepted when
    /// the read timeout expires.
    pub vmin: u8,

    /// Inter-character timeout in deciseconds; 0 uses the default slice.
    pub vtime: u8,

    /// Upper bound on waiting for one device answer.
    pub read_timeout: Duration,

    /// Wait after opening the port before the first flush.
    pub reset_delay: Duration,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl LineSettings {
    /// Creates settings with the reference defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            port_name: DEFAULT_PORT_NAME.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            vmin: DEFAULT_VMIN,
            vtime: DEFAULT_VTIME,
            read_timeout: DEFAULT_READ_TIMEOUT,
            reset_delay: DEFAULT_RESET_DELAY,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LineSettings {
    /// Sets the device path.
    #[inline]
    #[must_use]
    pub fn with_port_name(mut self, port_name: impl Into<String>) -> Self {
        self.port_name = port_name.into();
        self
    }

    /// Sets the baud rate.
    #[inline]
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the minimum answer length.
    #[inline]
    #[must_use]
    pub fn with_vmin(mut self, vmin: u8) -> Self {
        self.vmin = vmin;
        self
    }

    /// Sets the inter-character timeout in deciseconds.
    #[inline]
    #[must_use]
    pub fn with_vtime(mut self, vtime: u8) -> Self {
        self.vtime = vtime;
        self
    }

    /// Sets the answer timeout.
    #[inline]
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Sets the post-open reset delay.
    #[inline]
    #[must_use]
    pub fn with_reset_delay(mut self, reset_delay: Duration) -> Self {
        self.reset_delay = reset_delay;
        self
    }
}

// ============================================================================
// Derived Values
// ============================================================================

impl LineSettings {
    /// Longest a single device read may block.
    #[must_use]
    pub fn read_slice(&self) -> Duration {
        if self.vtime == 0 {
            DEFAULT_READ_SLICE
        } else {
            Duration::from_millis(u64::from(self.vtime) * 100)
        }
    }

    /// Minimum bytes for a partial answer to count as received.
    #[inline]
    #[must_use]
    pub fn min_response_bytes(&self) -> usize {
        usize::from(self.vmin).max(1)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.port_name.trim().is_empty() {
            return Err("Port name must not be empty".to_string());
        }
        if self.baud_rate == 0 {
            return Err("Baud rate must be greater than zero".to_string());
        }
        if self.read_timeout.is_zero() {
            return Err("Read timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
