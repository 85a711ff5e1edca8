//! M-Bus Protocol Constants
//!
//! This module defines constants used in the M-Bus protocol implementation,
//! based on the EN 13757 standard, plus the timing parameters of the Pulsar
//! heat-meter polling cycle.

use std::time::Duration;

/// Single-byte acknowledgement frame.
pub const MBUS_FRAME_ACK_START: u8 = 0xE5;

/// Start byte of a short frame.
pub const MBUS_FRAME_SHORT_START: u8 = 0x10;

/// Start byte of a control or long frame.
pub const MBUS_FRAME_LONG_START: u8 = 0x68;

/// Stop byte terminating every multi-byte frame.
pub const MBUS_FRAME_STOP: u8 = 0x16;

/// Network layer (secondary addressing) broadcast address
pub const MBUS_ADDRESS_NETWORK_LAYER: u8 = 0xFD;

// Control masks (full control bytes for common commands)
pub const MBUS_CONTROL_MASK_SND_NKE: u8 = 0x40;
pub const MBUS_CONTROL_MASK_SND_UD: u8 = 0x53; // includes DIR M2S
pub const MBUS_CONTROL_MASK_REQ_UD2: u8 = 0x5B; // includes DIR M2S
pub const MBUS_CONTROL_MASK_RSP_UD: u8 = 0x08; // S2M response

// Control flag bits
pub const MBUS_CONTROL_MASK_FCB: u8 = 0x20;
pub const MBUS_CONTROL_MASK_FCV: u8 = 0x10;

/// SND_UD with FCB set: control byte of the wakeup (select) telegram.
pub const MBUS_CONTROL_WAKEUP: u8 = MBUS_CONTROL_MASK_SND_UD | MBUS_CONTROL_MASK_FCB;

/// REQ_UD2 with FCB set: control byte of the data request frame.
pub const MBUS_CONTROL_REQUEST: u8 = MBUS_CONTROL_MASK_REQ_UD2 | MBUS_CONTROL_MASK_FCB;

// Control information (CI) codes
pub const MBUS_CONTROL_INFO_SELECT_SLAVE: u8 = 0x52;
pub const MBUS_CONTROL_INFO_RESP_VARIABLE: u8 = 0x72;
pub const MBUS_CONTROL_INFO_RESP_FIXED: u8 = 0x73;

/// Selection pattern following the target address in the wakeup telegram.
/// Matches the Pulsar manufacturer/medium/version signature with wildcarded
/// identification nibbles.
pub const MBUS_WAKEUP_PATTERN: [u8; 7] = [0x47, 0x06, 0x23, 0xFF, 0xFF, 0xFF, 0xFF];

/// DIF idle filler, skipped between records
pub const MBUS_DIB_DIF_IDLE_FILLER: u8 = 0x2F;

/// DIF manufacturer specific
pub const MBUS_DIB_DIF_MANUFACTURER_SPECIFIC: u8 = 0x0F;

/// DIF more records follow
pub const MBUS_DIB_DIF_MORE_RECORDS_FOLLOW: u8 = 0x1F;

/// DIF extension bit
pub const MBUS_DIB_DIF_EXTENSION_BIT: u8 = 0x80;

/// DIF (Data Information Field) mask for data length/encoding
pub const MBUS_DATA_RECORD_DIF_MASK_DATA: u8 = 0x0F;

/// VIF extension bit
pub const MBUS_DIB_VIF_EXTENSION_BIT: u8 = 0x80;

/// VIF without extension
pub const MBUS_DIB_VIF_WITHOUT_EXTENSION: u8 = 0x7F;

/// Length of the fixed header at the start of a variable-data response.
pub const MBUS_VARIABLE_HEADER_LENGTH: usize = 12;

/// Largest possible wire frame: 0x68 len len 0x68 + 255 payload + checksum + stop.
pub const MBUS_MAX_FRAME_SIZE: usize = 261;

// ----------------------------------------------------------------------------
// Bus timing (EN 13757-2 wired M-Bus at 2400 baud)
// ----------------------------------------------------------------------------

/// Baud rate fixed by the bus standard for these meters.
pub const MBUS_BAUD_RATE: u32 = 2400;

/// Delay between a write and the first read, letting the meter arm its
/// receiver.
pub const MBUS_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Per-attempt read timeout, the baseline granularity for all protocol
/// timeouts.
pub const MBUS_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Read attempts allowed while waiting for the wakeup acknowledgement.
pub const MBUS_ACK_ATTEMPTS: u32 = 4;
