//! Bridge protocol message types.
//!
//! This module defines the messages on both sides of the bridge.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Host → Bridge | JSON body for one session |
//! | `Command` | Bridge → Device | Newline-terminated command frame |
//! | `Response` | Device → Bridge | Fixed-size answer buffer |
//! | `Event` | Bridge → Host | Device answer or error, pushed asynchronously |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command vocabulary and framing |
//! | `event` | Events pushed to the host |
//! | `payload` | Device answer bodies and temperature conversion |
//! | `request` | Request envelope and response buffer |

// ============================================================================
// Submodules
// ============================================================================

/// Command vocabulary and framing.
pub mod command;

/// Event message types.
pub mod event;

/// Device answer payloads.
pub mod payload;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, CommandName, FRAME_TERMINATOR};
pub use event::Event;
pub use payload::{DevicePayload, format_measure, temperature_from_sample};
pub use request::{Jsep, RESPONSE_CAPACITY, Request, Response};
