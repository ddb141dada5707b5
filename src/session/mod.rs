//! Session state and lifecycle.
//!
//! A session is created when the host attaches a handle to the bridge and
//! lives until the host detaches it. Destruction is deferred: a destroyed
//! session leaves the active index at once, stays queryable while retired and
//! is freed by the [`watchdog`] after the grace period.
//!
//! ```text
//! create ──► live ──destroy──► retired ──(grace elapsed, watchdog tick)──► freed
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `registry` | Arena-backed session table with retirement queue |
//! | `watchdog` | Background task reaping retired sessions |

// ============================================================================
// Submodules
// ============================================================================

/// Session table.
pub mod registry;

/// Retired-session reaper.
pub mod watchdog;

// ============================================================================
// Re-exports
// ============================================================================

pub use registry::{DEFAULT_GRACE_PERIOD, SessionRegistry, SharedRegistry};
pub use watchdog::DEFAULT_WATCHDOG_PERIOD;

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::Instant;

use crate::identifiers::SessionHandle;

// ============================================================================
// Session
// ============================================================================

/// Per-handle session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Host handle.
    pub handle: SessionHandle,

    /// Slow-link notifications received.
    pub slowlink_count: u64,

    /// Set between a media hangup and the next media setup.
    pub hanging_up: bool,

    /// Monotonic destruction time, used for reaping.
    destroyed_at: Option<Instant>,

    /// Wall-clock destruction time, reported by queries.
    destroyed_wallclock: Option<SystemTime>,
}

impl Session {
    /// Creates a live session.
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            slowlink_count: 0,
            hanging_up: false,
            destroyed_at: None,
            destroyed_wallclock: None,
        }
    }

    /// Returns `true` until the session is destroyed.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.destroyed_at.is_none()
    }

    /// Returns when the session was destroyed.
    #[inline]
    #[must_use]
    pub fn destroyed_at(&self) -> Option<Instant> {
        self.destroyed_at
    }

    /// Marks the session destroyed at `now`.
    pub(crate) fn mark_destroyed(&mut self, now: Instant) {
        self.destroyed_at = Some(now);
        self.destroyed_wallclock = Some(SystemTime::now());
    }

    /// Returns the queryable view of this session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let destroyed = self
            .destroyed_wallclock
            .map(|at| {
                let micros = at
                    .duration_since(UNIX_EPOCH)
                    .map(|since| since.as_micros())
                    .unwrap_or_default();
                u64::try_from(micros).unwrap_or(u64::MAX).max(1)
            })
            .unwrap_or(0);

        SessionSnapshot {
            slowlink_count: self.slowlink_count,
            destroyed,
        }
    }
}

// ============================================================================
// SessionSnapshot
// ============================================================================

/// What a session query reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Slow-link notifications received.
    pub slowlink_count: u64,

    /// Destruction time in microseconds since the epoch; 0 while live.
    pub destroyed: u64,
}

// ============================================================================
// Tests
// ============================================================================
