//! Serial bridge coordinator.
//!
//! The [`Bridge`] is the single context object the plugin host talks to. It
//! owns the session registry, the request queue and the two background tasks
//! (dispatcher and watchdog).
//!
//! # Example
//!
//! ```no_run
//! use serial_bridge::{Bridge, Request, SessionHandle};
//!
//! # async fn example() -> serial_bridge::Result<()> {
//! let bridge = Bridge::builder().config_dir("/etc/janus").start().await?;
//!
//! let handle = SessionHandle::new(1);
//! bridge.create_session(handle)?;
//!
//! let pending = bridge.handle_message(
//!     Request::new(handle)
//!         .with_transaction("t1")
//!         .with_message(r#"{"command":2,"id":2}"#),
//! )?;
//! let event = pending.wait().await?;
//! println!("{}", event.body);
//!
//! bridge.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionHandle;
use crate::protocol::{Event, Request};
use crate::session::{Session, SessionRegistry, SharedRegistry, watchdog};
use crate::transport::Transport;

use super::builder::BridgeBuilder;
use super::config::BridgeConfig;
use super::dispatcher::{Dispatcher, EventHandler, Job, PendingReply, SharedEventHandler, emit};
use super::info::{PLUGIN_INFO, PluginInfo};
use super::lifecycle::Lifecycle;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the bridge.
pub(crate) struct BridgeInner {
    /// Resolved configuration.
    config: BridgeConfig,

    /// Session table shared with the worker and the watchdog.
    registry: SharedRegistry,

    /// Start/stop flags.
    lifecycle: Arc<Lifecycle>,

    /// Request queue; taken on shutdown.
    queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,

    /// Host push-event callback.
    event_handler: SharedEventHandler,

    /// Dispatcher task.
    worker: Mutex<Option<JoinHandle<()>>>,

    /// Watchdog task.
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        // Background tasks hold no reference back to the bridge.
        self.lifecycle.begin_stop();
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Bridge between host sessions and the serial device.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct Bridge {
    /// Shared inner state.
    pub(crate) inner: Arc<BridgeInner>,
}

// ============================================================================
// Bridge - Display
// ============================================================================

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("port_name", &self.inner.config.line.port_name)
            .field("running", &self.is_running())
            .field("session_count", &self.session_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Lifecycle
// ============================================================================

impl Bridge {
    /// Creates a configuration builder for the bridge.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Starts the worker and watchdog over an opened transport.
    pub(crate) fn start(config: BridgeConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate().map_err(Error::config)?;

        let registry = SessionRegistry::shared(config.grace_period);
        let lifecycle = Arc::new(Lifecycle::new());
        let event_handler: SharedEventHandler = Arc::new(Mutex::new(None));
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let device = transport.name().to_string();

        let worker = Dispatcher {
            transport,
            registry: Arc::clone(&registry),
            settings: config.line.clone(),
            lifecycle: Arc::clone(&lifecycle),
            event_handler: Arc::clone(&event_handler),
            queue_poll: config.queue_poll,
        }
        .spawn(queue_rx);

        let watchdog = watchdog::spawn(
            Arc::clone(&registry),
            lifecycle.stop_flag(),
            config.watchdog_period,
        );

        lifecycle.mark_started();

        info!(
            device = %device,
            baud_rate = config.line.baud_rate,
            name = PLUGIN_INFO.name,
            "Bridge initialized"
        );

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                registry,
                lifecycle,
                queue: Mutex::new(Some(queue_tx)),
                event_handler,
                worker: Mutex::new(Some(worker)),
                watchdog: Mutex::new(Some(watchdog)),
            }),
        })
    }

    /// Stops the bridge.
    ///
    /// Raises the stop flag, joins the worker (which finishes its current
    /// transaction and closes the device), joins the watchdog, then drops
    /// every session. Requests still queued produce no event. Calling this
    /// more than once is harmless.
    pub async fn shutdown(&self) {
        if !self.inner.lifecycle.begin_stop() {
            debug!("Shutdown already in progress or bridge not running");
            return;
        }

        info!("Stopping bridge");

        let worker = self.inner.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!(error = %e, "Dispatcher task failed");
        }

        let watchdog = self.inner.watchdog.lock().take();
        if let Some(watchdog) = watchdog
            && let Err(e) = watchdog.await
        {
            warn!(error = %e, "Watchdog task failed");
        }

        self.inner.queue.lock().take();
        self.inner.registry.lock().clear();
        self.inner.lifecycle.mark_stopped();

        info!("Bridge stopped");
    }

    /// Returns `true` while the bridge accepts work.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.is_running()
    }

    /// Returns the resolved configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Returns the plugin metadata.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &'static PluginInfo {
        &PLUGIN_INFO
    }
}

// ============================================================================
// Bridge - Sessions
// ============================================================================

impl Bridge {
    /// Registers a session for a host handle.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] unless running
    /// - [`Error::SessionExists`] if the handle is already live
    pub fn create_session(&self, handle: SessionHandle) -> Result<()> {
        self.inner.lifecycle.ensure_initialized()?;
        self.inner.registry.lock().create(handle)?;
        info!(session = %handle, "Session created");
        Ok(())
    }

    /// Destroys a session.
    ///
    /// The session is retired at once and freed by the watchdog after the
    /// grace period. Destroying a retired session again does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] unless running
    /// - [`Error::SessionNotFound`] if the handle is unknown
    pub fn destroy_session(&self, handle: SessionHandle) -> Result<()> {
        self.inner.lifecycle.ensure_initialized()?;
        if self.inner.registry.lock().destroy(handle)? {
            info!(session = %handle, "Session destroyed");
        } else {
            debug!(session = %handle, "Session already destroyed");
        }
        Ok(())
    }

    /// Returns the session state as JSON text, or `None` if unknown or the
    /// bridge is not running.
    #[must_use]
    pub fn query_session(&self, handle: SessionHandle) -> Option<String> {
        if !self.inner.lifecycle.is_running() {
            return None;
        }
        let snapshot = self.inner.registry.lock().query(handle)?;
        serde_json::to_string(&snapshot).ok()
    }

    /// Returns a copy of a live session.
    #[must_use]
    pub fn lookup_session(&self, handle: SessionHandle) -> Option<Session> {
        self.inner.registry.lock().lookup(handle).cloned()
    }

    /// Number of live sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Number of destroyed sessions not yet freed.
    #[inline]
    #[must_use]
    pub fn retired_count(&self) -> usize {
        self.inner.registry.lock().retired_len()
    }
}

// ============================================================================
// Bridge - Messages
// ============================================================================

impl Bridge {
    /// Queues a host message for the device.
    ///
    /// Never blocks. The outcome arrives later as an [`Event`], both through
    /// the event handler and through the returned [`PendingReply`].
    ///
    /// The session is resolved by the worker, not here: a request for an
    /// unknown or destroyed session is accepted and then dropped without an
    /// event, and its [`PendingReply`] yields [`Error::ChannelClosed`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] / [`Error::ShuttingDown`] unless running
    pub fn handle_message(&self, request: Request) -> Result<PendingReply> {
        self.inner.lifecycle.ensure_running()?;

        let handle = request.handle;
        let (reply, rx) = oneshot::channel();
        let pending = PendingReply::new(request.id, rx);
        let request_id = request.id;

        let queue = self.inner.queue.lock().clone().ok_or(Error::ShuttingDown)?;
        queue
            .send(Job { request, reply })
            .map_err(|_| Error::ShuttingDown)?;

        debug!(session = %handle, request_id = %request_id, "Message queued");
        Ok(pending)
    }

    /// Sets the callback receiving every pushed event.
    pub fn set_event_handler(&self, handler: EventHandler) {
        let mut guard = self.inner.event_handler.lock();
        *guard = Some(Arc::from(handler));
    }

    /// Clears the event handler.
    pub fn clear_event_handler(&self) {
        let mut guard = self.inner.event_handler.lock();
        *guard = None;
    }

    /// Pushes an event produced outside the queue.
    fn push_event(&self, event: &Event) {
        emit(&self.inner.event_handler, event);
    }
}

// ============================================================================
// Bridge - Media Hooks
// ============================================================================

impl Bridge {
    /// Media for a session became available.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] unless running
    /// - [`Error::SessionNotFound`] if the handle has no live session
    pub fn setup_media(&self, handle: SessionHandle) -> Result<()> {
        self.inner.lifecycle.ensure_initialized()?;
        let mut registry = self.inner.registry.lock();
        let session = registry
            .get_mut(handle)
            .ok_or_else(|| Error::session_not_found(handle))?;
        session.hanging_up = false;
        debug!(session = %handle, "Media set up");
        Ok(())
    }

    /// Media for a session went away.
    ///
    /// The first hangup pushes a `{"serial":"event","result":"done"}` event;
    /// repeated hangups before the next media setup are ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] unless running
    /// - [`Error::SessionNotFound`] if the handle has no live session
    pub fn hangup_media(&self, handle: SessionHandle) -> Result<()> {
        self.inner.lifecycle.ensure_initialized()?;

        let first = {
            let mut registry = self.inner.registry.lock();
            let session = registry
                .get_mut(handle)
                .ok_or_else(|| Error::session_not_found(handle))?;
            !std::mem::replace(&mut session.hanging_up, true)
        };

        if first {
            debug!(session = %handle, "Media hung up");
            self.push_event(&Event::hangup(handle));
        }
        Ok(())
    }

    /// The host reported a slow link for a session.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] unless running
    /// - [`Error::SessionNotFound`] if the handle has no live session
    pub fn slow_link(&self, handle: SessionHandle, uplink: bool) -> Result<()> {
        self.inner.lifecycle.ensure_initialized()?;
        let mut registry = self.inner.registry.lock();
        let session = registry
            .get_mut(handle)
            .ok_or_else(|| Error::session_not_found(handle))?;
        session.slowlink_count += 1;
        debug!(
            session = %handle,
            uplink,
            count = session.slowlink_count,
            "Slow link reported"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
