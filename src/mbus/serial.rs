//! # M-Bus Serial Transport
//!
//! This module abstracts the physical serial link behind the
//! [`MBusTransport`] trait and provides the production implementation over
//! `tokio-serial`, configured for the wired M-Bus standard: 2400 baud,
//! 8 data bits, even parity, 1 stop bit.
//!
//! Every read is bounded by an explicit timeout; nothing in this module can
//! block indefinitely.

use crate::constants::{MBUS_BAUD_RATE, MBUS_MAX_FRAME_SIZE, MBUS_READ_TIMEOUT};
use crate::error::MBusError;
use crate::mbus::frame::{pack_frame, parse_frame, MBusFrame};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;

/// Byte-level access to the half-duplex bus.
#[async_trait::async_trait]
pub trait MBusTransport: Send {
    /// Writes the full byte sequence to the bus.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), MBusError>;

    /// Reads up to `max_bytes`, returning whatever arrived within `timeout`.
    /// A window with no bytes at all is [`MBusError::Timeout`].
    async fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, MBusError>;
}

/// Configuration for the serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: MBUS_BAUD_RATE,
            read_timeout: MBUS_READ_TIMEOUT,
        }
    }
}

/// Exclusively-owned handle to the serial bus for the lifetime of the
/// driver.
pub struct SerialTransport {
    port: tokio_serial::SerialStream,
    config: SerialConfig,
}

impl SerialTransport {
    /// Opens the port with the bus-standard settings.
    pub async fn connect(port_name: &str) -> Result<SerialTransport, MBusError> {
        Self::connect_with_config(port_name, SerialConfig::default()).await
    }

    /// Opens the port with a custom configuration.
    pub async fn connect_with_config(
        port_name: &str,
        config: SerialConfig,
    ) -> Result<SerialTransport, MBusError> {
        let port = tokio_serial::new(port_name, config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::Even)
            .timeout(config.read_timeout)
            .open_native_async()
            .map_err(|e| MBusError::SerialPortError(e.to_string()))?;

        Ok(SerialTransport { port, config })
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl MBusTransport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), MBusError> {
        self.port
            .write_all(bytes)
            .await
            .map_err(|e| MBusError::SerialPortError(e.to_string()))?;
        self.port
            .flush()
            .await
            .map_err(|e| MBusError::SerialPortError(e.to_string()))
    }

    async fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, MBusError> {
        let mut buf = vec![0u8; max_bytes.min(MBUS_MAX_FRAME_SIZE)];
        let n = tokio::time::timeout(timeout, self.port.read(&mut buf))
            .await
            .map_err(|_| MBusError::Timeout)?
            .map_err(|e| MBusError::SerialPortError(e.to_string()))?;
        if n == 0 {
            return Err(MBusError::SerialPortError("serial port closed".into()));
        }
        buf.truncate(n);
        Ok(buf)
    }
}

/// Sends one packed frame over the transport.
pub async fn send_frame<T: MBusTransport + ?Sized>(
    transport: &mut T,
    frame: &MBusFrame,
) -> Result<(), MBusError> {
    transport.write(&pack_frame(frame)).await
}

/// Receives one frame, accumulating bytes until the codec can classify the
/// buffer or the deadline passes.
///
/// A deadline with an empty buffer is [`MBusError::Timeout`]; with a partial
/// buffer it is [`MBusError::IncompleteFrame`], so the caller can tell a
/// silent meter from a clipped transmission.
pub async fn recv_frame<T: MBusTransport + ?Sized>(
    transport: &mut T,
    timeout: Duration,
) -> Result<MBusFrame, MBusError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut buf: Vec<u8> = Vec::with_capacity(MBUS_MAX_FRAME_SIZE);

    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(if buf.is_empty() {
                MBusError::Timeout
            } else {
                MBusError::IncompleteFrame
            });
        }

        let chunk = match transport.read(MBUS_MAX_FRAME_SIZE, deadline - now).await {
            Ok(chunk) => chunk,
            Err(MBusError::Timeout) => {
                return Err(if buf.is_empty() {
                    MBusError::Timeout
                } else {
                    MBusError::IncompleteFrame
                });
            }
            Err(e) => return Err(e),
        };
        buf.extend_from_slice(&chunk);

        match parse_frame(&buf) {
            Ok(frame) => return Ok(frame),
            Err(MBusError::IncompleteFrame) => continue,
            Err(e) => return Err(e),
        }
    }
}
