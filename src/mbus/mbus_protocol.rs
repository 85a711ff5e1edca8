//! # Meter Session State Machine
//!
//! One [`MeterSession`] drives one complete poll of one meter address:
//!
//! ```text
//! Idle -> Waking -> AwaitingAck -> Requesting -> AwaitingData -> Done
//!                        |                             |
//!                        +----------> Failed <---------+
//! ```
//!
//! The exchange is half-duplex and timing-sensitive: the meter needs a
//! settle delay after each write before it will answer, the wakeup is
//! acknowledged with a bare 0xE5, and the data request is answered with a
//! long variable-data frame. `Done` and `Failed` are terminal; a new cycle
//! constructs a fresh session.

use crate::constants::*;
use crate::error::MBusError;
use crate::mbus::frame::{request_frame, wakeup_frame, MBusFrameType};
use crate::mbus::serial::{recv_frame, send_frame, MBusTransport};
use crate::payload::record::parse_variable_payload;
use crate::poller::{MeterAddress, MeterReading, RecordMap};
use log::debug;
use tokio::time::sleep;

/// Represents the states of the per-meter handshake.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionState {
    Idle,
    Waking,
    AwaitingAck,
    Requesting,
    AwaitingData,
    Done,
    Failed,
}

/// Drives one poll of one meter address. Not reusable across cycles.
pub struct MeterSession {
    address: MeterAddress,
    state: SessionState,
    ack_attempts: u32,
}

impl MeterSession {
    /// Creates a fresh session for one address.
    pub fn new(address: MeterAddress) -> Self {
        MeterSession {
            address,
            state: SessionState::Idle,
            ack_attempts: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read attempts consumed while waiting for the acknowledgement.
    pub fn ack_attempts(&self) -> u32 {
        self.ack_attempts
    }

    /// Runs the session to completion, producing one reading or the error
    /// that terminated the exchange. The session ends in `Done` or `Failed`.
    pub async fn poll<T: MBusTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        map: &RecordMap,
    ) -> Result<MeterReading, MBusError> {
        match self.run(transport, map).await {
            Ok(reading) => {
                self.state = SessionState::Done;
                Ok(reading)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn run<T: MBusTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        map: &RecordMap,
    ) -> Result<MeterReading, MBusError> {
        // Wakeup is fire-and-forget: no response is defined for the select
        // telegram itself, only for the ACK that follows the settle delay.
        self.state = SessionState::Waking;
        send_frame(transport, &wakeup_frame(self.address.as_byte())).await?;
        sleep(MBUS_SETTLE_DELAY).await;

        self.state = SessionState::AwaitingAck;
        let mut acknowledged = false;
        while self.ack_attempts < MBUS_ACK_ATTEMPTS {
            self.ack_attempts += 1;
            match recv_frame(transport, MBUS_READ_TIMEOUT).await {
                Ok(frame) if frame.frame_type == MBusFrameType::Ack => {
                    acknowledged = true;
                    break;
                }
                Ok(frame) => {
                    debug!(
                        "meter {}: expected ACK, got {:?} (attempt {})",
                        self.address, frame.frame_type, self.ack_attempts
                    );
                }
                Err(e) if e.is_bus_fatal() => return Err(e),
                Err(e) => {
                    debug!(
                        "meter {}: no ACK on attempt {}: {}",
                        self.address, self.ack_attempts, e
                    );
                }
            }
        }
        if !acknowledged {
            return Err(MBusError::NoResponse {
                attempts: MBUS_ACK_ATTEMPTS,
            });
        }

        self.state = SessionState::Requesting;
        send_frame(transport, &request_frame(self.address.as_byte())).await?;
        sleep(MBUS_SETTLE_DELAY).await;

        // Exactly one read attempt for the data frame.
        self.state = SessionState::AwaitingData;
        let frame = recv_frame(transport, MBUS_READ_TIMEOUT).await?;
        if frame.frame_type != MBusFrameType::Long {
            return Err(MBusError::FramingError(format!(
                "expected long data frame, got {:?}",
                frame.frame_type
            )));
        }
        if frame.control_information != MBUS_CONTROL_INFO_RESP_VARIABLE {
            return Err(MBusError::FramingError(format!(
                "unexpected response CI 0x{:02X}",
                frame.control_information
            )));
        }

        let (header, records) = parse_variable_payload(&frame.data)?;
        debug!(
            "meter {}: ident {} manufacturer {} medium 0x{:02X}, {} records",
            self.address,
            header.ident,
            header.manufacturer,
            header.medium,
            records.len()
        );

        map.apply(&records)
    }
}
