//! Mock transport implementation for testing
//!
//! Provides a scripted [`MBusTransport`] so the handshake state machine and
//! the poll orchestrator can be exercised without a serial device: each read
//! pops the next scripted step, each write is captured for inspection.

use crate::error::MBusError;
use crate::mbus::frame::{pack_frame, MBusFrame};
use crate::mbus::serial::MBusTransport;
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted outcome for a read call.
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Deliver these bytes.
    Reply(Vec<u8>),
    /// Simulate a silent bus for this read window.
    Timeout,
    /// Simulate a dead port.
    PortError(String),
}

/// Scripted mock transport.
#[derive(Debug, Default)]
pub struct MockTransport {
    steps: VecDeque<ReadStep>,
    writes: Vec<Vec<u8>>,
    write_error: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for a future read.
    pub fn push_reply(&mut self, bytes: &[u8]) {
        self.steps.push_back(ReadStep::Reply(bytes.to_vec()));
    }

    /// Queue a packed frame for a future read.
    pub fn push_frame(&mut self, frame: &MBusFrame) {
        self.push_reply(&pack_frame(frame));
    }

    /// Queue a read window that yields nothing.
    pub fn push_timeout(&mut self) {
        self.steps.push_back(ReadStep::Timeout);
    }

    /// Queue a port failure.
    pub fn push_port_error(&mut self, message: &str) {
        self.steps.push_back(ReadStep::PortError(message.into()));
    }

    /// Fail the next write call.
    pub fn fail_writes(&mut self, message: &str) {
        self.write_error = Some(message.into());
    }

    /// Byte sequences written so far, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Scripted steps not yet consumed.
    pub fn remaining_steps(&self) -> usize {
        self.steps.len()
    }
}

#[async_trait::async_trait]
impl MBusTransport for MockTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), MBusError> {
        if let Some(message) = &self.write_error {
            return Err(MBusError::SerialPortError(message.clone()));
        }
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    async fn read(&mut self, max_bytes: usize, _timeout: Duration) -> Result<Vec<u8>, MBusError> {
        match self.steps.pop_front() {
            Some(ReadStep::Reply(mut bytes)) => {
                if bytes.len() > max_bytes {
                    let rest = bytes.split_off(max_bytes);
                    self.steps.push_front(ReadStep::Reply(rest));
                }
                Ok(bytes)
            }
            Some(ReadStep::Timeout) | None => Err(MBusError::Timeout),
            Some(ReadStep::PortError(message)) => Err(MBusError::SerialPortError(message)),
        }
    }
}
