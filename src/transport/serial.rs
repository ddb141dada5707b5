//! Serial port device.
//!
//! Wraps a `serialport` handle configured as a raw 8N1 line without flow
//! control. The handle is blocking, so every call runs on the blocking pool.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::settings::LineSettings;
use super::{FlushTarget, Transport};

// ============================================================================
// Types
// ============================================================================

/// Port handle shared with blocking-pool closures.
type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

// ============================================================================
// SerialTransport
// ============================================================================

/// Transport over a real serial device.
pub struct SerialTransport {
    /// Device handle.
    port: SharedPort,
    /// Device path.
    name: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Opens and configures the device, then waits out the board reset.
    ///
    /// Opening the port toggles DTR on most USB serial adapters, which resets
    /// the microcontroller; anything it prints while booting is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if the port cannot be opened or
    /// configured.
    pub async fn open(settings: &LineSettings) -> Result<Self> {
        let name = settings.port_name.clone();
        let builder = serialport::new(&name, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_slice());

        let port = tokio::task::spawn_blocking(move || builder.open())
            .await
            .map_err(|e| Error::device_unavailable(&name, e.to_string()))?
            .map_err(|e| Error::device_unavailable(&name, e.to_string()))?;

        info!(
            device = %name,
            baud_rate = settings.baud_rate,
            "Serial port opened (8N1, raw, no flow control)"
        );

        let mut transport = Self {
            port: Arc::new(Mutex::new(port)),
            name,
        };

        if !settings.reset_delay.is_zero() {
            debug!(delay_ms = settings.reset_delay.as_millis() as u64, "Waiting for device reset");
            tokio::time::sleep(settings.reset_delay).await;
        }

        transport
            .flush(FlushTarget::Both)
            .await
            .map_err(|e| Error::device_unavailable(&transport.name, e.to_string()))?;

        Ok(transport)
    }

    /// Runs a blocking operation against the port.
    async fn blocking<T, F>(&self, op: F) -> io::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SerialPort) -> io::Result<T> + Send + 'static,
    {
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || {
            let mut guard = port.lock();
            op(&mut **guard)
        })
        .await
        .map_err(io::Error::other)?
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let data = bytes.to_vec();
        self.blocking(move |port| port.write(&data))
            .await
            .map_err(|e| Error::write_failure(e.to_string()))
    }

    async fn drain(&mut self) -> Result<()> {
        self.blocking(|port| port.flush())
            .await
            .map_err(|e| Error::write_failure(e.to_string()))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let capacity = buf.len();
        let result = self
            .blocking(move |port| {
                let mut chunk = vec![0u8; capacity];
                let count = port.read(&mut chunk)?;
                chunk.truncate(count);
                Ok(chunk)
            })
            .await;

        match result {
            Ok(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Err(e) if is_transient(e.kind()) => Ok(0),
            Err(e) => Err(Error::read_failure(e.to_string())),
        }
    }

    async fn flush(&mut self, target: FlushTarget) -> Result<()> {
        let buffer = match target {
            FlushTarget::Input => ClearBuffer::Input,
            FlushTarget::Output => ClearBuffer::Output,
            FlushTarget::Both => ClearBuffer::All,
        };

        self.blocking(move |port| port.clear(buffer).map_err(io::Error::from))
            .await
            .map_err(Error::from)
    }

    async fn close(&mut self) -> Result<()> {
        self.flush(FlushTarget::Both).await?;
        info!(device = %self.name, "Serial port closed");
        Ok(())
    }
}

/// Read errors that only mean "no data this slice".
fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn test_transient_kinds() {
        assert!(is_transient(ErrorKind::TimedOut));
        assert!(is_transient(ErrorKind::WouldBlock));
        assert!(is_transient(ErrorKind::Interrupted));
        assert!(!is_transient(ErrorKind::BrokenPipe));
        assert!(!is_transient(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_open_missing_device_is_unavailable() {
        let settings = LineSettings::new()
            .with_port_name("/dev/serial-bridge-does-not-exist")
            .with_reset_delay(Duration::ZERO);

        let err = SerialTransport::open(&settings).await.unwrap_err();

        match err {
            Error::DeviceUnavailable { path, .. } => {
                assert_eq!(path, "/dev/serial-bridge-does-not-exist");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
