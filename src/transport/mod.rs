//! Serial transport layer.
//!
//! This module owns the byte-level conversation with the device: one command
//! frame out, one bounded answer back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Dispatcher     │                              │  Firmware       │
//! │  (single owner) │        serial line           │  (MCU)          │
//! │  Transport      │◄────────────────────────────►│                 │
//! │                 │   9600 8N1, raw, no flow     │  VCP / UART     │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Transaction
//!
//! 1. Flush stale input left over from an earlier partial answer
//! 2. Write the encoded command frame
//! 3. Drain the output queue
//! 4. Read until a terminator arrives, the buffer fills, or the timeout expires
//! 5. Flush both directions
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `emulated` | In-memory device running the firmware emulator |
//! | `serial` | Real device through the `serialport` crate |
//! | `settings` | Line discipline configuration |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory device backed by the firmware emulator.
pub mod emulated;

/// Serial port device.
pub mod serial;

/// Line discipline settings.
pub mod settings;

// ============================================================================
// Re-exports
// ============================================================================

pub use emulated::{DeviceProbe, EmulatedDevice};
pub use serial::SerialTransport;
pub use settings::LineSettings;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::time::{Instant, timeout};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Command, RESPONSE_CAPACITY, Response};

// ============================================================================
// FlushTarget
// ============================================================================

/// Which device queue a flush discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTarget {
    /// Bytes received from the device but not yet read.
    Input,
    /// Bytes written but not yet transmitted.
    Output,
    /// Both queues.
    Both,
}

// ============================================================================
// Transport
// ============================================================================

/// Byte transport to the device.
///
/// Implementations are owned by exactly one task; none of the methods are
/// expected to be called concurrently.
#[async_trait]
pub trait Transport: Send {
    /// Device name used in logs.
    fn name(&self) -> &str;

    /// Writes bytes, returning how many were accepted.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Blocks until written bytes have been transmitted.
    async fn drain(&mut self) -> Result<()>;

    /// Waits at most one read slice for data.
    ///
    /// Returns `Ok(0)` when nothing arrived; transient conditions
    /// (would-block, interrupted) are reported the same way.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Discards queued bytes.
    async fn flush(&mut self, target: FlushTarget) -> Result<()>;

    /// Releases the device.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// Runs one command/answer exchange.
///
/// # Errors
///
/// - [`Error::WriteFailure`] if the frame could not be written or drained
/// - [`Error::ReadFailure`] if the device read failed
/// - [`Error::ReadTimeout`] if fewer than `vmin` bytes arrived in time
pub async fn transact(
    transport: &mut dyn Transport,
    command: &Command,
    settings: &LineSettings,
) -> Result<Response> {
    transport.flush(FlushTarget::Input).await?;

    let frame = command.encode();
    write_all(transport, &frame).await?;
    transport
        .drain()
        .await
        .map_err(|e| Error::write_failure(format!("drain failed: {e}")))?;

    trace!(device = transport.name(), %command, bytes = frame.len(), "Command frame written");

    let response = read_response(transport, settings).await;

    if let Err(e) = transport.flush(FlushTarget::Both).await {
        warn!(device = transport.name(), error = %e, "Post-transaction flush failed");
    }

    response
}

/// Writes the whole frame, retrying short writes.
async fn write_all(transport: &mut dyn Transport, frame: &[u8]) -> Result<()> {
    let mut written = 0;

    while written < frame.len() {
        let count = transport.write(&frame[written..]).await?;
        if count == 0 {
            return Err(Error::write_failure(format!(
                "device accepted {written} of {} bytes",
                frame.len()
            )));
        }
        written += count;
    }

    Ok(())
}

/// Reads one answer within the configured timeout.
async fn read_response(transport: &mut dyn Transport, settings: &LineSettings) -> Result<Response> {
    let deadline = Instant::now() + settings.read_timeout;
    let mut response = Response::new();
    let mut chunk = [0u8; RESPONSE_CAPACITY];

    while !response.is_complete() {
        let now = Instant::now();
        if now >= deadline {
            if response.len() >= settings.min_response_bytes() {
                warn!(
                    device = transport.name(),
                    received = response.len(),
                    "Accepting unterminated answer at read timeout"
                );
                return Ok(response);
            }
            return Err(Error::read_timeout(
                settings.read_timeout.as_millis() as u64,
                response.len(),
            ));
        }

        let room = RESPONSE_CAPACITY - response.len();
        match timeout(deadline - now, transport.read(&mut chunk[..room])).await {
            Ok(Ok(0)) | Err(_) => continue,
            Ok(Ok(count)) => {
                response.extend_from_slice(&chunk[..count]);
                trace!(device = transport.name(), count, total = response.len(), "Answer bytes read");
            }
            Ok(Err(e)) => return Err(e),
        }
    }

    Ok(response)
}

// ============================================================================
// Tests
// ============================================================================
