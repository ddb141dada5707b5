//! Bridge entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Context object the host drives |
//! | [`BridgeBuilder`] | Fluent configuration builder |
//! | [`BridgeConfig`] | Resolved configuration |
//! | [`PendingReply`] | Handle to a queued request's event |
//! | [`PluginInfo`] | Plugin identity |
//!
//! # Example
//!
//! ```no_run
//! use serial_bridge::{Bridge, Event, Request, Result, SessionHandle};
//!
//! # async fn example() -> Result<()> {
//! let bridge = Bridge::builder().port_name("/dev/ttyACM0").start().await?;
//! bridge.set_event_handler(Box::new(|event: &Event| println!("{}", event.body)));
//!
//! let handle = SessionHandle::new(1);
//! bridge.create_session(handle)?;
//! bridge.handle_message(Request::new(handle).with_message(r#"{"command":0,"id":3}"#))?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder.
pub mod builder;

/// Configuration file and defaults.
pub mod config;

/// Core bridge implementation.
pub mod core;

/// Request queue worker.
pub mod dispatcher;

/// Plugin identity.
pub mod info;

/// Start/stop flags.
mod lifecycle;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeBuilder;
pub use config::{BridgeConfig, CONFIG_FILE_NAME};
pub use core::Bridge;
pub use dispatcher::{EventHandler, PendingReply};
pub use info::{PLUGIN_INFO, PluginInfo};
