//! Request queue worker.
//!
//! A single task owns the transport and drains the request queue in FIFO
//! order, so device transactions never overlap.
//!
//! # Job Flow
//!
//! ```text
//! Bridge::handle_message ──► queue ──► worker
//!                                        │ session live?        no ──► discard
//!                                        │ parse command        err ─► error event (411/412/413)
//!                                        │ transact             err ─► error event (414)
//!                                        │ session still live?  no ──► discard
//!                                        └──► event handler + PendingReply
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Command, Event, Request};
use crate::session::SharedRegistry;
use crate::transport::{LineSettings, Transport, transact};

use super::lifecycle::Lifecycle;

// ============================================================================
// Types
// ============================================================================

/// Callback receiving every event the bridge pushes to the host.
///
/// Runs on the dispatcher task, or on the caller's thread for media hook
/// events. The handler lock is not held during the call, so a handler may
/// replace or clear itself.
pub type EventHandler = Box<dyn Fn(&Event) + Send + Sync>;

/// Installed handler; cloned out of its slot before each call.
pub(crate) type HandlerFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// Event handler slot shared between the bridge and its worker.
pub(crate) type SharedEventHandler = Arc<Mutex<Option<HandlerFn>>>;

/// Calls the installed handler, if any, without holding its lock.
pub(crate) fn emit(slot: &SharedEventHandler, event: &Event) {
    let handler = slot.lock().clone();
    if let Some(handler) = handler {
        handler(event);
    }
}

/// A queued request and the channel its event is delivered on.
pub(crate) struct Job {
    pub request: Request,
    pub reply: oneshot::Sender<Event>,
}

// ============================================================================
// PendingReply
// ============================================================================

/// Handle to the event a queued request will produce.
///
/// Requests whose session is destroyed before or during processing produce
/// no event; waiting on them yields [`Error::ChannelClosed`].
#[derive(Debug)]
pub struct PendingReply {
    request_id: RequestId,
    rx: oneshot::Receiver<Event>,
}

impl PendingReply {
    pub(crate) fn new(request_id: RequestId, rx: oneshot::Receiver<Event>) -> Self {
        Self { request_id, rx }
    }

    /// Returns the id of the queued request.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Waits for the event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the request was discarded.
    pub async fn wait(self) -> Result<Event> {
        Ok(self.rx.await?)
    }

    /// Waits for the event, giving up after `limit`.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] if the request was discarded
    /// - [`Error::Timeout`] if no event arrived in time
    pub async fn wait_timeout(self, limit: Duration) -> Result<Event> {
        let request_id = self.request_id;
        match timeout(limit, self.rx).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::timeout(
                format!("Waiting for reply to request {request_id}"),
                limit.as_millis() as u64,
            )),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// The queue worker.
pub(crate) struct Dispatcher {
    pub transport: Box<dyn Transport>,
    pub registry: SharedRegistry,
    pub settings: LineSettings,
    pub lifecycle: Arc<Lifecycle>,
    pub event_handler: SharedEventHandler,
    pub queue_poll: Duration,
}

impl Dispatcher {
    /// Spawns the worker task.
    pub(crate) fn spawn(self, queue: mpsc::UnboundedReceiver<Job>) -> JoinHandle<()> {
        tokio::spawn(self.run(queue))
    }

    /// Worker loop: bounded waits on the queue until shutdown.
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Job>) {
        info!(device = self.transport.name(), "Dispatcher started");

        while !self.lifecycle.is_stopping() {
            match timeout(self.queue_poll, queue.recv()).await {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => {
                    debug!("Request queue closed");
                    break;
                }
                Err(_) => continue,
            }
        }

        queue.close();
        let mut dropped = 0usize;
        while queue.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "Discarded queued requests on shutdown");
        }

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Error closing device");
        }

        info!("Dispatcher stopped");
    }

    /// Processes one job.
    async fn process(&mut self, job: Job) {
        let Job { request, reply } = job;
        let handle = request.handle;

        if !self.registry.lock().is_live(handle) {
            debug!(session = %handle, request_id = %request.id, "Session gone, discarding request");
            return;
        }

        if let Some(jsep) = &request.jsep {
            debug!(session = %handle, sdp_type = %jsep.sdp_type, "Ignoring session description");
        }

        let event = match request.parse_command() {
            Ok(command) => match self.execute(&command).await {
                Ok(text) => {
                    trace!(session = %handle, %command, answer = %text, "Device answered");
                    Event::device_response(&request, text)
                }
                Err(e) => {
                    error!(session = %handle, %command, error = %e, "Device transaction failed");
                    Event::error(&request, &e)
                }
            },
            Err(e) => {
                warn!(session = %handle, request_id = %request.id, error = %e, "Rejecting message");
                Event::error(&request, &e)
            }
        };

        if !self.registry.lock().is_live(handle) {
            debug!(session = %handle, request_id = %request.id, "Session destroyed mid-transaction, discarding event");
            return;
        }

        self.deliver(event, reply);
    }

    /// Runs one device transaction and returns the answer text.
    async fn execute(&mut self, command: &Command) -> Result<String> {
        let response = transact(self.transport.as_mut(), command, &self.settings).await?;
        response.text()
    }

    /// Pushes the event to the host and fulfils the pending reply.
    fn deliver(&self, event: Event, reply: oneshot::Sender<Event>) {
        emit(&self.event_handler, &event);

        if reply.send(event).is_err() {
            trace!("Reply receiver dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::SessionHandle;
    use crate::session::SessionRegistry;
    use crate::transport::{DeviceProbe, EmulatedDevice};

    struct Harness {
        dispatcher: Dispatcher,
        probe: DeviceProbe,
        registry: SharedRegistry,
        pushed: Arc<Mutex<Vec<Event>>>,
    }

    fn harness() -> Harness {
        let (device, probe) = EmulatedDevice::new();
        let registry = SessionRegistry::shared(Duration::from_secs(5));
        registry.lock().create(SessionHandle::new(1)).expect("create");

        let pushed: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&pushed);
        let handler: HandlerFn = Arc::new(move |event: &Event| sink.lock().push(event.clone()));

        let dispatcher = Dispatcher {
            transport: Box::new(device),
            registry: Arc::clone(&registry),
            settings: LineSettings::new().with_read_timeout(Duration::from_millis(200)),
            lifecycle: Arc::new(Lifecycle::new()),
            event_handler: Arc::new(Mutex::new(Some(handler))),
            queue_poll: Duration::from_millis(50),
        };

        Harness {
            dispatcher,
            probe,
            registry,
            pushed,
        }
    }

    fn job(body: &str) -> (Job, PendingReply) {
        let request = Request::new(SessionHandle::new(1))
            .with_transaction("tx")
            .with_message(body);
        let (tx, rx) = oneshot::channel();
        let pending = PendingReply::new(request.id, rx);
        (Job { request, reply: tx }, pending)
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_device_answer() {
        let mut h = harness();
        let (job, pending) = job(r#"{"command":0,"id":6}"#);

        h.dispatcher.process(job).await;

        let event = pending.wait().await.expect("event");
        assert_eq!(event.get_string("opstatus"), "ok");
        assert_eq!(event.get_i64("id"), 6);
        assert_eq!(event.transaction.as_deref(), Some("tx"));
        assert_eq!(h.probe.led(6), Some(true));
        assert_eq!(h.pushed.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_element_never_writes() {
        let mut h = harness();
        let (job, pending) = job(r#"{"command":7,"id":3}"#);

        h.dispatcher.process(job).await;

        let event = pending.wait().await.expect("event");
        assert_eq!(event.error_code(), Some(413));
        assert!(h.probe.frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_reports_414() {
        let mut h = harness();
        h.probe.set_unresponsive(true);
        let (job, pending) = job(r#"{"command":2,"id":1}"#);

        h.dispatcher.process(job).await;

        let event = pending.wait().await.expect("event");
        assert_eq!(event.error_code(), Some(414));
        assert!(event.get_string("error").starts_with("No response from device"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_session_discarded() {
        let mut h = harness();
        h.registry.lock().destroy(SessionHandle::new(1)).expect("destroy");
        let (job, pending) = job(r#"{"command":0,"id":3}"#);

        h.dispatcher.process(job).await;

        assert!(matches!(pending.wait().await, Err(Error::ChannelClosed(_))));
        assert!(h.probe.frames().is_empty());
        assert!(h.pushed.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_drains_queue_in_order() {
        let h = harness();
        let (tx, rx) = mpsc::unbounded_channel();
        let lifecycle = Arc::clone(&h.dispatcher.lifecycle);
        lifecycle.mark_started();

        let (first, first_reply) = job(r#"{"command":0,"id":3}"#);
        let (second, second_reply) = job(r#"{"command":1,"id":3}"#);
        tx.send(first).map_err(|_| "send").expect("queue");
        tx.send(second).map_err(|_| "send").expect("queue");

        let worker = h.dispatcher.spawn(rx);

        first_reply.wait().await.expect("first");
        second_reply.wait().await.expect("second");
        assert_eq!(
            h.probe.frames(),
            vec![
                r#"{"command":0,"id":3}"#.to_string(),
                r#"{"command":1,"id":3}"#.to_string(),
            ]
        );

        lifecycle.begin_stop();
        worker.await.expect("worker join");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout() {
        let (_tx, rx) = oneshot::channel::<Event>();
        let pending = PendingReply::new(RequestId::generate(), rx);

        let err = pending
            .wait_timeout(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { timeout_ms: 100, .. }));
    }
}
