//! Event message types.
//!
//! Events are what the bridge pushes back to the plugin host. Every request
//! produces at most one event; the media hooks produce the rest.
//!
//! # Event Bodies
//!
//! | Kind | Body |
//! |------|------|
//! | Device answer | the device response text, verbatim |
//! | Error | `{"serial":"event","error_code":412,"error":"JSON error: ..."}` |
//! | Hangup | `{"serial":"event","result":"done"}` |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionHandle};

use super::command::parse_object;
use super::request::Request;

// ============================================================================
// Constants
// ============================================================================

/// Value of the `serial` marker carried by bridge-generated bodies.
const EVENT_MARKER: &str = "event";

// ============================================================================
// Event
// ============================================================================

/// A notification pushed to the plugin host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Session the event is addressed to.
    pub handle: SessionHandle,

    /// Request that produced the event, if any.
    pub request_id: Option<RequestId>,

    /// Host transaction token of the originating request.
    pub transaction: Option<String>,

    /// Event body (JSON text).
    pub body: String,
}

impl Event {
    /// Creates an event carrying a device answer.
    #[must_use]
    pub fn device_response(request: &Request, text: impl Into<String>) -> Self {
        Self {
            handle: request.handle,
            request_id: Some(request.id),
            transaction: request.transaction.clone(),
            body: text.into(),
        }
    }

    /// Creates an error event for a failed request.
    ///
    /// Errors without an event code are reported as transport failures.
    #[must_use]
    pub fn error(request: &Request, error: &Error) -> Self {
        let code = error.event_code().unwrap_or(crate::error::ERROR_TRANSPORT);
        let body = json!({
            "serial": EVENT_MARKER,
            "error_code": code,
            "error": error.to_string(),
        });

        Self {
            handle: request.handle,
            request_id: Some(request.id),
            transaction: request.transaction.clone(),
            body: body.to_string(),
        }
    }

    /// Creates the event announcing that media for a session is gone.
    #[must_use]
    pub fn hangup(handle: SessionHandle) -> Self {
        let body = json!({
            "serial": EVENT_MARKER,
            "result": "done",
        });

        Self {
            handle,
            request_id: None,
            transaction: None,
            body: body.to_string(),
        }
    }

    /// Parses the body as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJson`] if the body is not a JSON object.
    pub fn json(&self) -> Result<Value> {
        parse_object(&self.body)
    }

    /// Returns the error code if this is an error event.
    #[must_use]
    pub fn error_code(&self) -> Option<u16> {
        self.json()
            .ok()
            .and_then(|v| v.get("error_code").and_then(Value::as_u64))
            .and_then(|code| u16::try_from(code).ok())
    }

    /// Returns `true` if this is an error event.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error_code().is_some()
    }

    /// Gets a string value from the body.
    ///
    /// Returns empty string if key not found or not a string.
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.json()
            .ok()
            .and_then(|v| v.get(key).and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default()
    }

    /// Gets an integer value from the body.
    ///
    /// Returns 0 if key not found or not an integer.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> i64 {
        self.json()
            .ok()
            .and_then(|v| v.get(key).and_then(Value::as_i64))
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request::new(SessionHandle::new(3)).with_transaction("tx-9")
    }

    #[test]
    fn test_device_response_event() {
        let request = request();
        let event = Event::device_response(&request, r#"{"opstatus":"ok","id":3}"#);

        assert_eq!(event.handle, SessionHandle::new(3));
        assert_eq!(event.request_id, Some(request.id));
        assert_eq!(event.transaction.as_deref(), Some("tx-9"));
        assert_eq!(event.get_string("opstatus"), "ok");
        assert_eq!(event.get_i64("id"), 3);
        assert!(!event.is_error());
    }

    #[test]
    fn test_error_event_shape() {
        let event = Event::error(&request(), &Error::InvalidMessage);
        let body = event.json().expect("json body");

        assert_eq!(body["serial"], "event");
        assert_eq!(body["error_code"], 411);
        assert_eq!(body["error"], "No message??");
        assert_eq!(event.error_code(), Some(411));
        assert_eq!(event.transaction.as_deref(), Some("tx-9"));
    }

    #[test]
    fn test_error_event_escapes_cause() {
        let err = Error::invalid_json("expected `\"` at line 1");
        let event = Event::error(&request(), &err);
        assert_eq!(event.get_string("error"), "JSON error: expected `\"` at line 1");
    }

    #[test]
    fn test_error_event_defaults_to_transport_code() {
        let event = Event::error(&request(), &Error::NotInitialized);
        assert_eq!(event.error_code(), Some(414));
    }

    #[test]
    fn test_hangup_event() {
        let event = Event::hangup(SessionHandle::new(5));
        assert_eq!(event.get_string("result"), "done");
        assert_eq!(event.get_string("serial"), "event");
        assert!(event.transaction.is_none());
        assert!(event.request_id.is_none());
    }

    #[test]
    fn test_non_json_body_helpers_default() {
        let event = Event {
            handle: SessionHandle::new(1),
            request_id: None,
            transaction: None,
            body: "garbage".into(),
        };
        assert!(event.json().is_err());
        assert_eq!(event.get_string("x"), "");
        assert_eq!(event.get_i64("x"), 0);
        assert!(!event.is_error());
    }
}
