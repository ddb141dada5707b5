//! Retired-session reaper.
//!
//! Ticks at a fixed period, frees every retired session whose grace period
//! has elapsed and exits once the stop flag is raised.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, trace};

use super::registry::SharedRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Default tick period.
pub const DEFAULT_WATCHDOG_PERIOD: Duration = Duration::from_millis(500);

// ============================================================================
// Watchdog
// ============================================================================

/// Spawns the reaper task.
///
/// The task observes `stop` once per tick, so it exits at most one period
/// after the flag is raised.
pub fn spawn(registry: SharedRegistry, stop: Arc<AtomicBool>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(period_ms = period.as_millis() as u64, "Watchdog started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if stop.load(Ordering::Acquire) {
                break;
            }

            let reaped = registry.lock().reap(Instant::now());
            if reaped > 0 {
                trace!(reaped, "Watchdog tick");
            }
        }

        debug!("Watchdog stopped");
    })
}

// ============================================================================
// Tests
// ============================================================================
