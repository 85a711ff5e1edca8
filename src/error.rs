//! # M-Bus Error Handling
//!
//! This module defines the MBusError enum, which represents the different
//! error types that can occur while polling meters over the bus.

use thiserror::Error;

/// Represents the different error types that can occur in the M-Bus driver.
#[derive(Debug, Error)]
pub enum MBusError {
    /// Indicates an error related to the serial port itself. Fatal for the
    /// whole poll cycle: no further progress is possible on a dead port.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates a bounded read that yielded no bytes at all.
    #[error("Read timed out")]
    Timeout,

    /// Indicates a partial frame: more bytes are needed before the buffer
    /// can be classified. The caller may keep reading.
    #[error("Incomplete frame: need more bytes")]
    IncompleteFrame,

    /// Indicates a structural violation of the wire format (start/stop byte,
    /// mismatched length bytes). Fatal for the address this cycle.
    #[error("Framing error: {0}")]
    FramingError(String),

    /// Indicates a checksum mismatch on a received frame.
    #[error("Invalid checksum: expected 0x{expected:02X}, calculated 0x{calculated:02X}")]
    InvalidChecksum { expected: u8, calculated: u8 },

    /// Indicates the meter never acknowledged the wakeup telegram.
    #[error("No response from meter after {attempts} acknowledgement attempts")]
    NoResponse { attempts: u32 },

    /// Indicates a data record that declares more value bytes than the
    /// payload still holds.
    #[error("Malformed record at payload offset {offset}: {reason}")]
    MalformedRecord { offset: usize, reason: String },

    /// Indicates a record index named by the role mapping was absent from
    /// the decoded response.
    #[error("Record {index} missing from response")]
    MissingRecord { index: usize },

    /// Indicates an unknown Value Information Field (VIF) was encountered.
    #[error("Unknown VIF: 0x{0:02X}")]
    UnknownVif(u8),

    /// Indicates an unknown Data Information Field (DIF) was encountered.
    #[error("Unknown DIF: 0x{0:02X}")]
    UnknownDif(u8),

    /// Indicates a meter address that is not a two-hex-digit byte.
    #[error("Invalid meter address: {0}")]
    InvalidAddress(String),
}

impl MBusError {
    /// True when the error means the shared bus resource itself is unusable,
    /// so the orchestrator must stop the cycle instead of moving on to the
    /// next address.
    pub fn is_bus_fatal(&self) -> bool {
        matches!(self, MBusError::SerialPortError(_))
    }
}
