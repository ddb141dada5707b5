//! Request and Response message types.
//!
//! A [`Request`] is what the plugin host hands the bridge: a session handle,
//! an optional transaction token and an opaque JSON body. A [`Response`] is
//! the fixed-capacity buffer the device answer is read into.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionHandle};

use super::command::{Command, FRAME_TERMINATOR, parse_object};

// ============================================================================
// Constants
// ============================================================================

/// Capacity of the device response buffer.
pub const RESPONSE_CAPACITY: usize = 256;

/// Envelope key used by web clients to wrap the command object.
const ENVELOPE_KEY: &str = "message";

// ============================================================================
// Jsep
// ============================================================================

/// Session description attached to a message by the host.
///
/// Media negotiation is not handled by the bridge; the description is carried
/// so it can be logged and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jsep {
    /// SDP type (`offer` or `answer`).
    pub sdp_type: String,
    /// SDP text.
    pub sdp: String,
}

// ============================================================================
// Request
// ============================================================================

/// A message submitted by the host for one session.
///
/// # Example
///
/// ```
/// use serial_bridge::{Request, SessionHandle};
///
/// let request = Request::new(SessionHandle::new(1))
///     .with_transaction("abc123")
///     .with_message(r#"{"command":0,"id":3}"#);
/// assert_eq!(request.transaction.as_deref(), Some("abc123"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// Bridge-assigned identifier.
    pub id: RequestId,

    /// Session the message belongs to.
    pub handle: SessionHandle,

    /// Host correlation token, echoed on the resulting event.
    pub transaction: Option<String>,

    /// JSON body.
    pub message: Option<String>,

    /// Optional session description (ignored).
    pub jsep: Option<Jsep>,
}

impl Request {
    /// Creates an empty request for a session.
    #[inline]
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        Self {
            id: RequestId::generate(),
            handle,
            transaction: None,
            message: None,
            jsep: None,
        }
    }

    /// Sets the transaction token.
    #[inline]
    #[must_use]
    pub fn with_transaction(mut self, transaction: impl Into<String>) -> Self {
        self.transaction = Some(transaction.into());
        self
    }

    /// Sets the JSON body.
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches a session description.
    #[inline]
    #[must_use]
    pub fn with_jsep(mut self, sdp_type: impl Into<String>, sdp: impl Into<String>) -> Self {
        self.jsep = Some(Jsep {
            sdp_type: sdp_type.into(),
            sdp: sdp.into(),
        });
        self
    }

    /// Validates the body and extracts the command it carries.
    ///
    /// A body of the form `{"message": {...}}` is unwrapped first.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidMessage`] if the body is missing or blank
    /// - [`Error::InvalidJson`] if the body is not a JSON object
    /// - [`Error::InvalidElement`] / [`Error::UnknownCommand`] from field extraction
    pub fn parse_command(&self) -> Result<Command> {
        let body = self
            .message
            .as_deref()
            .map(str::trim)
            .filter(|body| !body.is_empty())
            .ok_or(Error::InvalidMessage)?;

        let value = parse_object(body)?;

        match value.get(ENVELOPE_KEY) {
            Some(inner @ Value::Object(_)) => Command::from_value(inner),
            _ => Command::from_value(&value),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Fixed-capacity buffer holding one device answer.
///
/// The device pads its answer with NUL bytes up to the buffer size; only the
/// text before the first terminator or NUL is significant.
#[derive(Clone)]
pub struct Response {
    bytes: [u8; RESPONSE_CAPACITY],
    len: usize,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("len", &self.len)
            .field("text", &String::from_utf8_lossy(self.significant()))
            .finish()
    }
}

impl Response {
    /// Creates an empty buffer.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0; RESPONSE_CAPACITY],
            len: 0,
        }
    }

    /// Number of bytes received so far.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing has been received.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the buffer cannot take more bytes.
    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len == RESPONSE_CAPACITY
    }

    /// Returns the received bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Appends as much of `data` as fits, returning the count copied.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(RESPONSE_CAPACITY - self.len);
        self.bytes[self.len..self.len + count].copy_from_slice(&data[..count]);
        self.len += count;
        count
    }

    /// Returns `true` once the answer is complete: a terminator arrived or
    /// the buffer is full.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_full() || self.as_bytes().contains(&FRAME_TERMINATOR)
    }

    /// Returns the answer text with padding and framing removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadFailure`] if the answer carries no text.
    pub fn text(&self) -> Result<String> {
        let text = String::from_utf8_lossy(self.significant());
        let text = text.trim();

        if text.is_empty() {
            return Err(Error::read_failure("empty response from device"));
        }

        Ok(text.to_string())
    }

    /// Parses the answer text as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadFailure`] for an empty answer or
    /// [`Error::InvalidJson`] if the answer is not a JSON object.
    pub fn json(&self) -> Result<Value> {
        parse_object(&self.text()?)
    }

    /// Bytes before the first terminator or NUL.
    fn significant(&self) -> &[u8] {
        let bytes = self.as_bytes();
        let end = bytes
            .iter()
            .position(|&b| b == FRAME_TERMINATOR || b == 0)
            .unwrap_or(bytes.len());
        &bytes[..end]
    }
}

// ============================================================================
// Tests
// ============================================================================
