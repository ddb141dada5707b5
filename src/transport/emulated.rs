//! In-memory device backed by the firmware emulator.
//!
//! [`EmulatedDevice`] behaves like a serial line with the reference firmware
//! on the other end. The paired [`DeviceProbe`] inspects and perturbs it from
//! tests and demos: it sees every frame the bridge wrote, reads LED state and
//! can make the device go silent or fail writes.
//!
//! # Example
//!
//! ```
//! use serial_bridge::transport::EmulatedDevice;
//!
//! let (device, probe) = EmulatedDevice::new();
//! probe.set_temperature_sample(1000);
//! assert!(probe.frames().is_empty());
//! # drop(device);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::firmware::{Firmware, SimulatedBoard};
use crate::protocol::FRAME_TERMINATOR;

use super::{FlushTarget, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Device name reported in logs.
const DEVICE_NAME: &str = "emulated";

/// How long an empty read waits before returning.
const READ_SLICE: Duration = Duration::from_millis(50);

// ============================================================================
// DeviceState
// ============================================================================

/// Shared device state.
#[derive(Debug, Default)]
struct DeviceState {
    firmware: Firmware<SimulatedBoard>,
    /// Bytes written by the host, up to the next terminator.
    line: Vec<u8>,
    /// Bytes the device has written and the host has not read.
    output: VecDeque<u8>,
    /// Every complete frame received, without its terminator.
    frames: Vec<String>,
    unresponsive: bool,
    fail_writes: bool,
    chunk_size: Option<usize>,
}

impl DeviceState {
    /// Feeds host bytes to the firmware, one line at a time.
    fn receive(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte != FRAME_TERMINATOR {
                self.line.push(byte);
                continue;
            }

            let line = String::from_utf8_lossy(&self.line).into_owned();
            self.line.clear();
            self.frames.push(line.clone());

            if self.unresponsive {
                trace!(frame = %line, "Device unresponsive, frame ignored");
                continue;
            }

            if let Some(payload) = self.firmware.handle_line(&line) {
                self.output
                    .extend(Firmware::<SimulatedBoard>::frame(&payload));
            }
        }
    }
}

// ============================================================================
// EmulatedDevice
// ============================================================================

/// A [`Transport`] talking to the firmware emulator.
#[derive(Debug)]
pub struct EmulatedDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl EmulatedDevice {
    /// Creates a device and the probe observing it.
    #[must_use]
    pub fn new() -> (Self, DeviceProbe) {
        let state = Arc::new(Mutex::new(DeviceState::default()));
        let probe = DeviceProbe {
            state: Arc::clone(&state),
        };
        (Self { state }, probe)
    }
}

#[async_trait]
impl Transport for EmulatedDevice {
    fn name(&self) -> &str {
        DEVICE_NAME
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(Error::write_failure("device disconnected"));
        }
        state.receive(bytes);
        Ok(bytes.len())
    }

    async fn drain(&mut self) -> Result<()> {
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let count = read_available(&self.state, buf);
        if count > 0 {
            return Ok(count);
        }

        tokio::time::sleep(READ_SLICE).await;
        Ok(read_available(&self.state, buf))
    }

    async fn flush(&mut self, target: FlushTarget) -> Result<()> {
        let mut state = self.state.lock();
        if matches!(target, FlushTarget::Input | FlushTarget::Both) {
            state.output.clear();
        }
        if matches!(target, FlushTarget::Output | FlushTarget::Both) {
            state.line.clear();
        }
        Ok(())
    }
}

/// Moves pending device output into `buf`.
fn read_available(state: &Mutex<DeviceState>, buf: &mut [u8]) -> usize {
    let mut state = state.lock();
    let limit = state.chunk_size.unwrap_or(usize::MAX);
    let count = buf.len().min(limit).min(state.output.len());

    for (slot, byte) in buf.iter_mut().zip(state.output.drain(..count)) {
        *slot = byte;
    }

    count
}

// ============================================================================
// DeviceProbe
// ============================================================================

/// Test handle onto an [`EmulatedDevice`].
#[derive(Debug, Clone)]
pub struct DeviceProbe {
    state: Arc<Mutex<DeviceState>>,
}

impl DeviceProbe {
    /// Returns every frame received so far.
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        self.state.lock().frames.clone()
    }

    /// Returns the state of an LED.
    #[must_use]
    pub fn led(&self, id: i32) -> Option<bool> {
        self.state.lock().firmware.board().led(id)
    }

    /// Bytes written by the device and not yet read.
    #[must_use]
    pub fn pending_output(&self) -> usize {
        self.state.lock().output.len()
    }

    /// Sets the raw temperature sensor sample.
    pub fn set_temperature_sample(&self, sample: u16) {
        self.state
            .lock()
            .firmware
            .board_mut()
            .set_temperature_sample(sample);
    }

    /// Sets the accelerometer reading.
    pub fn set_accelerometer(&self, measure: [i16; 3]) {
        self.state.lock().firmware.board_mut().set_accelerometer(measure);
    }

    /// Makes the device ignore every frame.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.state.lock().unresponsive = unresponsive;
    }

    /// Makes every write fail.
    pub fn set_fail_writes(&self, fail_writes: bool) {
        self.state.lock().fail_writes = fail_writes;
    }

    /// Limits how many bytes a single read returns.
    pub fn set_chunk_size(&self, chunk_size: usize) {
        self.state.lock().chunk_size = Some(chunk_size.max(1));
    }

    /// Queues raw bytes as if the device had written them.
    pub fn inject_output(&self, bytes: &[u8]) {
        self.state.lock().output.extend(bytes.iter().copied());
    }
}

// ============================================================================
// Tests
// ============================================================================
