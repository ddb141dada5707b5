//! Command vocabulary and serial framing.
//!
//! A command travels to the device as one JSON object terminated by a
//! newline:
//!
//! ```text
//! {"command":0,"id":3}\n
//! ```
//!
//! | Name | Code | Target |
//! |------|------|--------|
//! | `ON` | 0 | actuator id |
//! | `OFF` | 1 | actuator id |
//! | `READ` | 2 | sensor id |
//!
//! Decoding goes through a generic JSON parse followed by typed field
//! extraction. Only the top-level `command` and `id` keys are recognized;
//! anything else in the object is ignored.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Byte that terminates every command frame on the wire.
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Key holding the command code.
const COMMAND_KEY: &str = "command";

/// Key holding the target identifier.
const ID_KEY: &str = "id";

// ============================================================================
// CommandName
// ============================================================================

/// The closed set of commands understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// Switch an actuator on.
    On,
    /// Switch an actuator off.
    Off,
    /// Read a sensor.
    Read,
}

impl CommandName {
    /// Every command, in code order.
    pub const ALL: [Self; 3] = [Self::On, Self::Off, Self::Read];

    /// Returns the numeric wire code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::On => 0,
            Self::Off => 1,
            Self::Read => 2,
        }
    }

    /// Returns the upper-case command name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
            Self::Read => "READ",
        }
    }

    /// Resolves a numeric wire code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] for codes outside the vocabulary.
    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.code() == code)
            .ok_or_else(|| Error::unknown_command(code.to_string()))
    }

    /// Resolves a command by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] for names outside the vocabulary.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::unknown_command(name))
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Command
// ============================================================================

/// A command addressed to one actuator or sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    /// What to do.
    pub name: CommandName,
    /// Which actuator or sensor.
    pub id: i32,
}

impl Command {
    /// Creates a command.
    #[inline]
    #[must_use]
    pub const fn new(name: CommandName, id: i32) -> Self {
        Self { name, id }
    }

    /// Creates an `ON` command.
    #[inline]
    #[must_use]
    pub const fn on(id: i32) -> Self {
        Self::new(CommandName::On, id)
    }

    /// Creates an `OFF` command.
    #[inline]
    #[must_use]
    pub const fn off(id: i32) -> Self {
        Self::new(CommandName::Off, id)
    }

    /// Creates a `READ` command.
    #[inline]
    #[must_use]
    pub const fn read(id: i32) -> Self {
        Self::new(CommandName::Read, id)
    }

    /// Encodes the command as a newline-terminated frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = format!(
            "{{\"{COMMAND_KEY}\":{},\"{ID_KEY}\":{}}}",
            self.name.code(),
            self.id
        )
        .into_bytes();
        frame.push(FRAME_TERMINATOR);
        frame
    }

    /// Decodes one frame or message body.
    ///
    /// Surrounding whitespace, including the frame terminator, is accepted.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidJson`] if the text is not a JSON object
    /// - [`Error::InvalidElement`] if `command` or `id` is missing or mistyped
    /// - [`Error::UnknownCommand`] if the command is outside the vocabulary
    pub fn decode(text: &str) -> Result<Self> {
        let value = parse_object(text)?;
        Self::from_value(&value)
    }

    /// Extracts a command from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Same as [`Command::decode`].
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::invalid_json("not an object"))?;
        Self::from_object(object)
    }

    /// Extracts a command from the fields of a JSON object.
    ///
    /// # Errors
    ///
    /// Same as [`Command::decode`], minus the parse step.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self> {
        let name = match object.get(COMMAND_KEY) {
            Some(Value::Number(number)) => {
                let code = number.as_i64().ok_or_else(|| {
                    Error::invalid_element(format!("'{COMMAND_KEY}' must be an integer"))
                })?;
                CommandName::from_code(code)?
            }
            Some(Value::String(name)) => CommandName::from_name(name)?,
            Some(other) => {
                return Err(Error::invalid_element(format!(
                    "'{COMMAND_KEY}' has unexpected type {}",
                    type_name(other)
                )));
            }
            None => {
                return Err(Error::invalid_element(format!(
                    "missing mandatory element '{COMMAND_KEY}'"
                )));
            }
        };

        let id = match object.get(ID_KEY) {
            Some(Value::Number(number)) => {
                let raw = number.as_i64().ok_or_else(|| {
                    Error::invalid_element(format!("'{ID_KEY}' must be an integer"))
                })?;
                i32::try_from(raw).map_err(|_| {
                    Error::invalid_element(format!("'{ID_KEY}' out of range: {raw}"))
                })?
            }
            Some(other) => {
                return Err(Error::invalid_element(format!(
                    "'{ID_KEY}' has unexpected type {}",
                    type_name(other)
                )));
            }
            None => {
                return Err(Error::invalid_element(format!(
                    "missing mandatory element '{ID_KEY}'"
                )));
            }
        };

        Ok(Self { name, id })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.id)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses text that must hold a single JSON object.
///
/// # Errors
///
/// Returns [`Error::InvalidJson`] on parse failure or a non-object top level.
pub fn parse_object(text: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::invalid_json(format!("on line {}: {e}", e.line())))?;

    if !value.is_object() {
        return Err(Error::invalid_json("not an object"));
    }

    Ok(value)
}

/// Human-readable JSON type name for diagnostics.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_encode_on_command() {
        let frame = Command::on(3).encode();
        assert_eq!(frame, b"{\"command\":0,\"id\":3}\n");
    }

    #[test]
    fn test_encode_codes() {
        assert_eq!(Command::off(4).encode(), b"{\"command\":1,\"id\":4}\n");
        assert_eq!(Command::read(2).encode(), b"{\"command\":2,\"id\":2}\n");
    }

    #[test]
    fn test_decode_ignores_unknown_keys() {
        let command = Command::decode(r#"{"session": 9, "command": 2, "id": 1, "x": [1, 2]}"#)
            .expect("decode");
        assert_eq!(command, Command::read(1));
    }

    #[test]
    fn test_decode_accepts_command_names() {
        let command = Command::decode(r#"{"command": "off", "id": 6}"#).expect("decode");
        assert_eq!(command, Command::off(6));
    }

    #[test]
    fn test_decode_accepts_trailing_terminator() {
        let command = Command::decode("{\"command\":0,\"id\":5}\n").expect("decode");
        assert_eq!(command, Command::on(5));
    }

    #[test]
    fn test_decode_malformed_is_invalid_json() {
        let err = Command::decode("{bad").unwrap_err();
        assert!(matches!(err, Error::InvalidJson { .. }));
        assert!(err.to_string().starts_with("JSON error: on line 1"));
    }

    #[test]
    fn test_decode_non_object_is_invalid_json() {
        for text in ["[0, 3]", "42", "\"command\"", "null", "true"] {
            let err = Command::decode(text).unwrap_err();
            assert!(matches!(err, Error::InvalidJson { .. }), "{text}: {err}");
        }
    }

    #[test]
    fn test_decode_unknown_code() {
        let err = Command::decode(r#"{"command": 7, "id": 3}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownCommand { ref command } if command == "7"));
    }

    #[test]
    fn test_decode_unknown_name() {
        let err = Command::decode(r#"{"command": "blink", "id": 3}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownCommand { .. }));
    }

    #[test]
    fn test_decode_type_mismatch() {
        let err = Command::decode(r#"{"command": 0, "id": "3"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidElement { .. }));

        let err = Command::decode(r#"{"command": 0.5, "id": 3}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidElement { .. }));

        let err = Command::decode(r#"{"command": [0], "id": 3}"#).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_decode_missing_fields() {
        let err = Command::decode(r#"{"id": 3}"#).unwrap_err();
        assert!(err.to_string().contains("'command'"));

        let err = Command::decode(r#"{"command": 1}"#).unwrap_err();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_decode_id_out_of_range() {
        let err = Command::decode(r#"{"command": 1, "id": 4294967296}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidElement { .. }));
    }

    #[test]
    fn test_command_name_lookup() {
        assert_eq!(CommandName::from_code(1).expect("code"), CommandName::Off);
        assert_eq!(CommandName::from_name("Read").expect("name"), CommandName::Read);
        assert!(CommandName::from_code(-1).is_err());
        assert_eq!(CommandName::On.to_string(), "ON");
    }

    fn any_command_name() -> impl Strategy<Value = CommandName> {
        prop_oneof![
            Just(CommandName::On),
            Just(CommandName::Off),
            Just(CommandName::Read),
        ]
    }

    proptest! {
        #[test]
        fn prop_encode_decode_preserves_command(name in any_command_name(), id in -1000i32..1000) {
            let command = Command::new(name, id);
            let frame = command.encode();
            prop_assert_eq!(frame.last(), Some(&FRAME_TERMINATOR));

            let text = std::str::from_utf8(&frame).expect("utf-8 frame");
            prop_assert_eq!(Command::decode(text).expect("decode"), command);
        }

        #[test]
        fn prop_decode_never_panics(text in ".{0,64}") {
            let _ = Command::decode(&text);
        }
    }
}
