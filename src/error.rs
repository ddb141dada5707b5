//! Error types for the serial bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use serial_bridge::{Bridge, Result, SessionHandle};
//!
//! fn open_session(bridge: &Bridge, handle: SessionHandle) -> Result<()> {
//!     bridge.create_session(handle)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Lifecycle | [`Error::NotInitialized`], [`Error::ShuttingDown`], [`Error::Timeout`] |
//! | Session | [`Error::SessionNotFound`], [`Error::SessionExists`] |
//! | Device | [`Error::DeviceUnavailable`], [`Error::WriteFailure`], [`Error::ReadFailure`], [`Error::ReadTimeout`] |
//! | Message | [`Error::InvalidMessage`], [`Error::InvalidJson`], [`Error::InvalidElement`], [`Error::UnknownCommand`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Toml`] |
//!
//! # Event Codes
//!
//! Errors caused by a host message are reported back to the host as an error
//! event carrying a numeric code (see [`Error::event_code`]):
//!
//! | Code | Variants |
//! |------|----------|
//! | 411 | [`Error::InvalidMessage`] |
//! | 412 | [`Error::InvalidJson`] |
//! | 413 | [`Error::InvalidElement`], [`Error::UnknownCommand`] |
//! | 414 | device transaction failures |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::SessionHandle;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Event Codes
// ============================================================================

/// The message body was missing or empty.
pub const ERROR_NO_MESSAGE: u16 = 411;

/// The message body was not a JSON object.
pub const ERROR_INVALID_JSON: u16 = 412;

/// A field of the message had the wrong type or value.
pub const ERROR_INVALID_ELEMENT: u16 = 413;

/// The device transaction failed (write, read or timeout).
pub const ERROR_TRANSPORT: u16 = 414;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the bridge configuration is invalid or unreadable.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The bridge has not been started, or has already been shut down.
    #[error("Plugin not initialized")]
    NotInitialized,

    /// The bridge is shutting down and rejects new work.
    #[error("Shutting down")]
    ShuttingDown,

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// No session is associated with the handle.
    #[error("No session associated with handle {handle}")]
    SessionNotFound {
        /// The unknown handle.
        handle: SessionHandle,
    },

    /// A live session already exists for the handle.
    #[error("Session already exists for handle {handle}")]
    SessionExists {
        /// The duplicate handle.
        handle: SessionHandle,
    },

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The serial device could not be opened or configured.
    ///
    /// Fatal to startup: the bridge does not start its tasks.
    #[error("Device unavailable at {path}: {message}")]
    DeviceUnavailable {
        /// Device path that failed to open.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// Writing a command frame to the device failed.
    #[error("Serial write failed: {message}")]
    WriteFailure {
        /// Description of the write failure.
        message: String,
    },

    /// Reading the device response failed.
    #[error("Serial read failed: {message}")]
    ReadFailure {
        /// Description of the read failure.
        message: String,
    },

    /// The device did not answer within the read timeout.
    #[error("No response from device after {timeout_ms}ms ({received} bytes received)")]
    ReadTimeout {
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
        /// Bytes received before the deadline.
        received: usize,
    },

    /// Waiting for a bridge operation timed out.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    // ========================================================================
    // Message Errors
    // ========================================================================
    /// The message body was missing or empty.
    #[error("No message??")]
    InvalidMessage,

    /// The message body failed to parse, or was not a JSON object.
    #[error("JSON error: {message}")]
    InvalidJson {
        /// Parser diagnostic.
        message: String,
    },

    /// A recognized field had the wrong type or an out-of-range value.
    #[error("Invalid element: {message}")]
    InvalidElement {
        /// Description of the offending field.
        message: String,
    },

    /// The command code is outside the known vocabulary.
    #[error("Unknown command: {command}")]
    UnknownCommand {
        /// The unrecognized command as received.
        command: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file parse error.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a session not found error.
    #[inline]
    pub fn session_not_found(handle: SessionHandle) -> Self {
        Self::SessionNotFound { handle }
    }

    /// Creates a session exists error.
    #[inline]
    pub fn session_exists(handle: SessionHandle) -> Self {
        Self::SessionExists { handle }
    }

    /// Creates a device unavailable error.
    #[inline]
    pub fn device_unavailable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a write failure error.
    #[inline]
    pub fn write_failure(message: impl Into<String>) -> Self {
        Self::WriteFailure {
            message: message.into(),
        }
    }

    /// Creates a read failure error.
    #[inline]
    pub fn read_failure(message: impl Into<String>) -> Self {
        Self::ReadFailure {
            message: message.into(),
        }
    }

    /// Creates a read timeout error.
    #[inline]
    pub fn read_timeout(timeout_ms: u64, received: usize) -> Self {
        Self::ReadTimeout {
            timeout_ms,
            received,
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates an invalid JSON error.
    #[inline]
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }

    /// Creates an invalid element error.
    #[inline]
    pub fn invalid_element(message: impl Into<String>) -> Self {
        Self::InvalidElement {
            message: message.into(),
        }
    }

    /// Creates an unknown command error.
    #[inline]
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error rejects work at the API boundary.
    #[inline]
    #[must_use]
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::ShuttingDown)
    }

    /// Returns `true` if this is a device transaction failure.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::WriteFailure { .. } | Self::ReadFailure { .. } | Self::ReadTimeout { .. }
        )
    }

    /// Returns `true` if this error was caused by the content of a message.
    #[inline]
    #[must_use]
    pub fn is_message_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage
                | Self::InvalidJson { .. }
                | Self::InvalidElement { .. }
                | Self::UnknownCommand { .. }
        )
    }

    /// Returns the code reported to the host in an error event.
    ///
    /// Returns `None` for errors that never reach the host as events.
    #[must_use]
    pub fn event_code(&self) -> Option<u16> {
        match self {
            Self::InvalidMessage => Some(ERROR_NO_MESSAGE),
            Self::InvalidJson { .. } => Some(ERROR_INVALID_JSON),
            Self::InvalidElement { .. } | Self::UnknownCommand { .. } => {
                Some(ERROR_INVALID_ELEMENT)
            }
            _ if self.is_transport_error() => Some(ERROR_TRANSPORT),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::device_unavailable("/dev/ttyACM0", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Device unavailable at /dev/ttyACM0: No such file or directory"
        );
    }

    #[test]
    fn test_invalid_message_display_matches_event_cause() {
        assert_eq!(Error::InvalidMessage.to_string(), "No message??");
        assert_eq!(
            Error::invalid_json("not an object").to_string(),
            "JSON error: not an object"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout("Waiting for device answer", 2500);
        assert_eq!(err.to_string(), "Waiting for device answer timed out after 2500ms");
        assert_eq!(err.event_code(), None);
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(Error::NotInitialized.to_string(), "Plugin not initialized");
        assert_eq!(Error::ShuttingDown.to_string(), "Shutting down");
    }

    #[test]
    fn test_event_codes() {
        assert_eq!(Error::InvalidMessage.event_code(), Some(411));
        assert_eq!(Error::invalid_json("x").event_code(), Some(412));
        assert_eq!(Error::invalid_element("x").event_code(), Some(413));
        assert_eq!(Error::unknown_command("7").event_code(), Some(413));
        assert_eq!(Error::read_timeout(100, 0).event_code(), Some(414));
        assert_eq!(Error::write_failure("x").event_code(), Some(414));
        assert_eq!(Error::NotInitialized.event_code(), None);
        assert_eq!(Error::config("x").event_code(), None);
    }

    #[test]
    fn test_is_transport_error() {
        assert!(Error::read_failure("broken pipe").is_transport_error());
        assert!(Error::read_timeout(2000, 3).is_transport_error());
        assert!(!Error::InvalidMessage.is_transport_error());
    }

    #[test]
    fn test_is_lifecycle_error() {
        assert!(Error::NotInitialized.is_lifecycle_error());
        assert!(Error::ShuttingDown.is_lifecycle_error());
        assert!(!Error::config("x").is_lifecycle_error());
    }

    #[test]
    fn test_is_message_error() {
        assert!(Error::InvalidMessage.is_message_error());
        assert!(Error::unknown_command("9").is_message_error());
        assert!(!Error::write_failure("x").is_message_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "device not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
