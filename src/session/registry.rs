//! Arena-backed session table.
//!
//! Sessions live in a slot arena. Live sessions are indexed by handle;
//! destroyed ones leave that index and join a retirement queue ordered by
//! destruction time, which the watchdog drains once the grace period passes.
//! A second index maps each retired handle to its most recent retired slot.
//!
//! ```text
//! active:         { 0x1 → slot 0, 0x3 → slot 2 }
//! retired:        [ (t0, slot 1), (t1, slot 3) ]   oldest first
//! retired_index:  { 0x2 → slot 1, 0x4 → slot 3 }
//! slots:          [ S1, S2†, S3, S4† ]             † destroyed
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::SessionHandle;

use super::{Session, SessionSnapshot};

// ============================================================================
// Constants
// ============================================================================

/// How long a destroyed session is kept before it is freed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Registry shared by the bridge, its worker and its watchdog.
pub type SharedRegistry = Arc<Mutex<SessionRegistry>>;

// ============================================================================
// SessionRegistry
// ============================================================================

/// Session table with deferred destruction.
#[derive(Debug)]
pub struct SessionRegistry {
    /// Session storage; `None` marks a free slot.
    slots: Vec<Option<Session>>,

    /// Free slot indices.
    free: Vec<usize>,

    /// Live sessions by handle.
    active: FxHashMap<SessionHandle, usize>,

    /// Destroyed sessions awaiting reaping, oldest first.
    retired: VecDeque<(Instant, usize)>,

    /// Latest retired slot per handle.
    retired_index: FxHashMap<SessionHandle, usize>,

    /// Minimum age of a retired session before it is freed.
    grace_period: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(grace_period: Duration) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            active: FxHashMap::default(),
            retired: VecDeque::new(),
            retired_index: FxHashMap::default(),
            grace_period,
        }
    }

    /// Creates an empty registry behind a shared lock.
    #[must_use]
    pub fn shared(grace_period: Duration) -> SharedRegistry {
        Arc::new(Mutex::new(Self::new(grace_period)))
    }

    /// Returns the grace period.
    #[inline]
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Number of live sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns `true` if there are no live sessions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Number of destroyed sessions not yet freed.
    #[inline]
    #[must_use]
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

impl SessionRegistry {
    /// Registers a live session.
    ///
    /// A handle whose previous session is still retired may be reused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionExists`] if the handle is already live.
    pub fn create(&mut self, handle: SessionHandle) -> Result<()> {
        if self.active.contains_key(&handle) {
            return Err(Error::session_exists(handle));
        }

        let session = Session::new(handle);
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(session);
                slot
            }
            None => {
                self.slots.push(Some(session));
                self.slots.len() - 1
            }
        };

        self.active.insert(handle, slot);
        trace!(session = %handle, slot, "Session registered");
        Ok(())
    }

    /// Destroys a session.
    ///
    /// Returns `true` if a live session was retired, `false` if it had
    /// already been destroyed and is still awaiting reaping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the handle is unknown.
    pub fn destroy(&mut self, handle: SessionHandle) -> Result<bool> {
        let Some(slot) = self.active.remove(&handle) else {
            if self.retired_slot(handle).is_some() {
                return Ok(false);
            }
            return Err(Error::session_not_found(handle));
        };

        let now = Instant::now();
        if let Some(session) = self.slots[slot].as_mut() {
            session.mark_destroyed(now);
        }
        self.retired.push_back((now, slot));
        self.retired_index.insert(handle, slot);

        trace!(session = %handle, slot, "Session retired");
        Ok(true)
    }

    /// Frees every retired session older than the grace period.
    ///
    /// Returns the number of sessions freed.
    pub fn reap(&mut self, now: Instant) -> usize {
        let mut reaped = 0;

        while let Some(&(destroyed_at, slot)) = self.retired.front() {
            if now.saturating_duration_since(destroyed_at) < self.grace_period {
                break;
            }
            self.retired.pop_front();
            if let Some(session) = self.slots[slot].take() {
                if self.retired_index.get(&session.handle) == Some(&slot) {
                    self.retired_index.remove(&session.handle);
                }
                trace!(session = %session.handle, slot, "Session freed");
            }
            self.free.push(slot);
            reaped += 1;
        }

        if reaped > 0 {
            debug!(reaped, remaining = self.retired.len(), "Retired sessions reaped");
        }
        reaped
    }

    /// Returns when the oldest retired session becomes reapable.
    #[must_use]
    pub fn next_reap_at(&self) -> Option<Instant> {
        self.retired
            .front()
            .map(|&(destroyed_at, _)| destroyed_at + self.grace_period)
    }

    /// Drops every session, live or retired.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.active.clear();
        self.retired.clear();
        self.retired_index.clear();
    }
}

// ============================================================================
// Lookup
// ============================================================================

impl SessionRegistry {
    /// Returns the live session for a handle.
    #[must_use]
    pub fn lookup(&self, handle: SessionHandle) -> Option<&Session> {
        self.active
            .get(&handle)
            .and_then(|&slot| self.slots[slot].as_ref())
    }

    /// Returns the live session for a handle, mutably.
    pub fn get_mut(&mut self, handle: SessionHandle) -> Option<&mut Session> {
        let slot = *self.active.get(&handle)?;
        self.slots[slot].as_mut()
    }

    /// Returns `true` if the handle names a live session.
    #[inline]
    #[must_use]
    pub fn is_live(&self, handle: SessionHandle) -> bool {
        self.active.contains_key(&handle)
    }

    /// Returns the snapshot of a live or retired session.
    ///
    /// A live session shadows a retired one with the same handle.
    #[must_use]
    pub fn query(&self, handle: SessionHandle) -> Option<SessionSnapshot> {
        let slot = self
            .active
            .get(&handle)
            .copied()
            .or_else(|| self.retired_slot(handle))?;
        self.slots[slot].as_ref().map(Session::snapshot)
    }

    /// Most recent retired slot holding `handle`.
    fn retired_slot(&self, handle: SessionHandle) -> Option<usize> {
        self.retired_index.get(&handle).copied()
    }
}

// ============================================================================
// Tests
// ============================================================================
