//! Serial bridge - plugin host sessions to a microcontroller over a serial line.
//!
//! This library relays JSON command messages from media-server sessions to a
//! device running a small command interpreter, and pushes the device answers
//! back to the originating session as events.
//!
//! # Architecture
//!
//! ```text
//!  host threads                 bridge                          device
//! ┌────────────┐  handle_message  ┌───────┐  one at a time  ┌──────────┐
//! │ session A  │ ───────────────► │ queue │ ──► Dispatcher ─► serial   │
//! │ session B  │ ◄─── events ──── └───────┘     (owns the   │ line     │
//! └────────────┘                                transport)  └──────────┘
//!                   Watchdog reaps destroyed sessions after a grace period
//! ```
//!
//! Key design principles:
//!
//! - One [`Bridge`] per device; no process globals
//! - A single worker owns the transport, so transactions never overlap
//! - Every device read is bounded by a timeout
//! - Errors reach the host as JSON error events, never as panics
//!
//! # Quick Start
//!
//! ```no_run
//! use serial_bridge::{Bridge, Event, Request, Result, SessionHandle};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bridge = Bridge::builder()
//!         .config_dir("/opt/janus/etc/janus")
//!         .start()
//!         .await?;
//!
//!     bridge.set_event_handler(Box::new(|event: &Event| {
//!         println!("{} <- {}", event.handle, event.body);
//!     }));
//!
//!     let handle = SessionHandle::new(1);
//!     bridge.create_session(handle)?;
//!
//!     let reply = bridge
//!         .handle_message(Request::new(handle).with_message(r#"{"command":0,"id":3}"#))?
//!         .wait()
//!         .await?;
//!     println!("LED 3: {}", reply.body);
//!
//!     bridge.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Bridge`], builder, configuration and dispatcher |
//! | [`error`] | Error types, event codes and [`Result`] alias |
//! | [`firmware`] | Firmware emulator for tests and demos |
//! | [`identifiers`] | Session handle and request ID wrappers |
//! | [`protocol`] | Host messages, device commands and answers |
//! | [`session`] | Session registry and watchdog |
//! | [`transport`] | Serial and emulated device transports |

// ============================================================================
// Modules
// ============================================================================

/// Bridge entry point.
///
/// Use [`Bridge::builder()`] to configure and start a bridge.
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host-side firmware emulator.
pub mod firmware;

/// Type-safe identifiers.
pub mod identifiers;

/// Bridge protocol message types.
pub mod protocol;

/// Session state, registry and watchdog.
pub mod session;

/// Device transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{
    Bridge, BridgeBuilder, BridgeConfig, EventHandler, PLUGIN_INFO, PendingReply, PluginInfo,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SessionHandle};

// Protocol types
pub use protocol::{Command, CommandName, DevicePayload, Event, Request, Response};

// Session types
pub use session::{Session, SessionSnapshot};

// Transport types
pub use transport::{EmulatedDevice, LineSettings, SerialTransport, Transport};
