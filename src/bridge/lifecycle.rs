//! Bridge run state.
//!
//! Two flags gate every public operation: `initialized` is raised once the
//! worker and watchdog are running, `stopping` is raised when shutdown begins
//! and is what both background tasks poll.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

// ============================================================================
// Lifecycle
// ============================================================================

/// Shared start/stop flags.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    initialized: AtomicBool,
    stopping: Arc<AtomicBool>,
}

impl Lifecycle {
    /// Creates flags for a bridge that has not started.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks the bridge as accepting work.
    pub(crate) fn mark_started(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Raises the stop flag.
    ///
    /// Returns `true` for the call that actually began the shutdown.
    pub(crate) fn begin_stop(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
            && !self.stopping.swap(true, Ordering::AcqRel)
    }

    /// Marks shutdown as complete.
    pub(crate) fn mark_stopped(&self) {
        self.initialized.store(false, Ordering::Release);
    }

    /// Returns `true` once shutdown has begun.
    #[inline]
    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Returns `true` while the bridge accepts work.
    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        self.initialized.load(Ordering::Acquire) && !self.is_stopping()
    }

    /// Rejects work unless the bridge is running.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] before start or after shutdown completed
    /// - [`Error::ShuttingDown`] while shutdown is in progress
    pub(crate) fn ensure_running(&self) -> Result<()> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }
        if self.is_stopping() {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    /// Rejects session changes unless the bridge is running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before start, during shutdown and
    /// after it.
    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Stop flag handed to the watchdog.
    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopping)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_started() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.is_running());
        assert!(matches!(lifecycle.ensure_running(), Err(Error::NotInitialized)));
        assert!(!lifecycle.begin_stop());
    }

    #[test]
    fn test_full_cycle() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_started();
        assert!(lifecycle.is_running());
        assert!(lifecycle.ensure_running().is_ok());
        assert!(lifecycle.ensure_initialized().is_ok());

        assert!(lifecycle.begin_stop());
        assert!(!lifecycle.begin_stop());
        assert!(matches!(lifecycle.ensure_running(), Err(Error::ShuttingDown)));
        assert!(matches!(lifecycle.ensure_initialized(), Err(Error::NotInitialized)));

        lifecycle.mark_stopped();
        assert!(matches!(lifecycle.ensure_running(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_stop_flag_is_shared() {
        let lifecycle = Lifecycle::new();
        let flag = lifecycle.stop_flag();
        lifecycle.mark_started();
        lifecycle.begin_stop();
        assert!(flag.load(Ordering::Acquire));
    }
}
