//! # M-Bus Frame Codec
//!
//! This module decodes and encodes Meter-Bus (M-Bus) wire frames: the
//! single-byte acknowledgement, the fixed five-byte short frame, and the
//! variable-length control/long frames carrying a data-record payload.
//!
//! Decoding distinguishes two failure classes the caller treats very
//! differently:
//! - [`MBusError::IncompleteFrame`]: the buffer ends before the frame does;
//!   the caller may keep reading from the wire.
//! - [`MBusError::FramingError`] / [`MBusError::InvalidChecksum`]: the bytes
//!   are structurally wrong; retrying the same buffer cannot help.
//!
//! Encoding covers the two telegrams the polling cycle sends: the long
//! wakeup (select) telegram and the short REQ_UD2 data request. Both carry
//! a checksum computed as the modulo-256 sum of their checksum span.

use crate::constants::*;
use crate::error::MBusError;
use bytes::{BufMut, BytesMut};
use nom::bytes::streaming::take;

/// Represents an M-Bus frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MBusFrame {
    pub frame_type: MBusFrameType,
    pub control: u8,
    pub address: u8,
    pub control_information: u8,
    pub data: Vec<u8>,
    pub checksum: u8,
}

/// Represents the different types of M-Bus frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MBusFrameType {
    Ack,
    Short,
    Control,
    Long,
}

/// Pulls exactly `count` bytes off the buffer, mapping a short buffer to
/// `IncompleteFrame`.
fn take_bytes(input: &[u8], count: usize) -> Result<(&[u8], &[u8]), MBusError> {
    let result: nom::IResult<&[u8], &[u8]> = take(count)(input);
    match result {
        Ok((rest, bytes)) => Ok((rest, bytes)),
        Err(nom::Err::Incomplete(_)) => Err(MBusError::IncompleteFrame),
        Err(_) => Err(MBusError::FramingError("truncated frame".into())),
    }
}

/// Parses and validates one M-Bus frame from the start of `input`.
///
/// Classifies the frame by its leading byte (0xE5 / 0x10 / 0x68), checks the
/// structural invariants (repeated length bytes, repeated start byte, stop
/// byte) and verifies the trailing checksum. Trailing bytes after the frame
/// are ignored; the wire is half-duplex so at most one frame is in flight.
pub fn parse_frame(input: &[u8]) -> Result<MBusFrame, MBusError> {
    let (rest, start) = take_bytes(input, 1)?;
    match start[0] {
        MBUS_FRAME_ACK_START => Ok(MBusFrame {
            frame_type: MBusFrameType::Ack,
            control: 0,
            address: 0,
            control_information: 0,
            data: Vec::new(),
            checksum: 0,
        }),
        MBUS_FRAME_SHORT_START => parse_short_frame(rest),
        MBUS_FRAME_LONG_START => parse_long_frame(rest),
        other => Err(MBusError::FramingError(format!(
            "invalid start byte 0x{other:02X}"
        ))),
    }
}

/// Parses a short frame body: control, address, checksum, stop.
fn parse_short_frame(input: &[u8]) -> Result<MBusFrame, MBusError> {
    let (_, body) = take_bytes(input, 4)?;
    if body[3] != MBUS_FRAME_STOP {
        return Err(MBusError::FramingError(format!(
            "missing stop byte, got 0x{:02X}",
            body[3]
        )));
    }
    let frame = MBusFrame {
        frame_type: MBusFrameType::Short,
        control: body[0],
        address: body[1],
        control_information: 0,
        data: Vec::new(),
        checksum: body[2],
    };
    verify_frame(&frame)?;
    Ok(frame)
}

/// Parses a control or long frame body after the first 0x68.
fn parse_long_frame(input: &[u8]) -> Result<MBusFrame, MBusError> {
    let (rest, header) = take_bytes(input, 3)?;
    let (length1, length2, start2) = (header[0], header[1], header[2]);
    if length1 != length2 {
        return Err(MBusError::FramingError(format!(
            "mismatched length bytes 0x{length1:02X} / 0x{length2:02X}"
        )));
    }
    if start2 != MBUS_FRAME_LONG_START {
        return Err(MBusError::FramingError(format!(
            "second start byte is 0x{start2:02X}, expected 0x68"
        )));
    }
    if length1 < 3 {
        return Err(MBusError::FramingError(format!(
            "length byte 0x{length1:02X} below minimum of 3"
        )));
    }

    // length counts C + A + CI + data; checksum and stop byte follow.
    let (_, body) = take_bytes(rest, length1 as usize + 2)?;
    let (control, address, control_information) = (body[0], body[1], body[2]);
    let data = body[3..length1 as usize].to_vec();
    let checksum = body[length1 as usize];
    let stop = body[length1 as usize + 1];
    if stop != MBUS_FRAME_STOP {
        return Err(MBusError::FramingError(format!(
            "missing stop byte, got 0x{stop:02X}"
        )));
    }

    let frame = MBusFrame {
        frame_type: if length1 == 3 {
            MBusFrameType::Control
        } else {
            MBusFrameType::Long
        },
        control,
        address,
        control_information,
        data,
        checksum,
    };
    verify_frame(&frame)?;
    Ok(frame)
}

/// Packs an M-Bus frame into its wire representation.
pub fn pack_frame(frame: &MBusFrame) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(MBUS_MAX_FRAME_SIZE);

    match frame.frame_type {
        MBusFrameType::Ack => {
            buf.put_u8(MBUS_FRAME_ACK_START);
        }
        MBusFrameType::Short => {
            buf.put_u8(MBUS_FRAME_SHORT_START);
            buf.put_u8(frame.control);
            buf.put_u8(frame.address);
            buf.put_u8(frame.checksum);
            buf.put_u8(MBUS_FRAME_STOP);
        }
        MBusFrameType::Control | MBusFrameType::Long => {
            let length = frame.data.len() as u8 + 3;
            buf.put_u8(MBUS_FRAME_LONG_START);
            buf.put_u8(length);
            buf.put_u8(length);
            buf.put_u8(MBUS_FRAME_LONG_START);
            buf.put_u8(frame.control);
            buf.put_u8(frame.address);
            buf.put_u8(frame.control_information);
            buf.put_slice(&frame.data);
            buf.put_u8(frame.checksum);
            buf.put_u8(MBUS_FRAME_STOP);
        }
    }

    buf.to_vec()
}

/// Verifies the trailing checksum of an M-Bus frame.
pub fn verify_frame(frame: &MBusFrame) -> Result<(), MBusError> {
    let calculated = calculate_checksum(frame);
    if frame.checksum != calculated {
        return Err(MBusError::InvalidChecksum {
            expected: frame.checksum,
            calculated,
        });
    }
    Ok(())
}

/// Calculates the modulo-256 checksum over a frame's checksum span.
pub fn calculate_checksum(frame: &MBusFrame) -> u8 {
    let mut checksum: u8 = 0;
    match frame.frame_type {
        MBusFrameType::Ack => {}
        MBusFrameType::Short => {
            checksum = checksum.wrapping_add(frame.control);
            checksum = checksum.wrapping_add(frame.address);
        }
        MBusFrameType::Control | MBusFrameType::Long => {
            checksum = checksum.wrapping_add(frame.control);
            checksum = checksum.wrapping_add(frame.address);
            checksum = checksum.wrapping_add(frame.control_information);
            for byte in &frame.data {
                checksum = checksum.wrapping_add(*byte);
            }
        }
    }
    checksum
}

/// Builds the long wakeup (select) telegram for one meter address:
/// `68 0B 0B 68 73 FD 52 <addr> 47 06 23 FF FF FF FF <ck> 16`.
///
/// The telegram is addressed to the network layer; the target address rides
/// in the first data byte of the selection pattern.
pub fn wakeup_frame(address: u8) -> MBusFrame {
    let mut data = Vec::with_capacity(1 + MBUS_WAKEUP_PATTERN.len());
    data.push(address);
    data.extend_from_slice(&MBUS_WAKEUP_PATTERN);

    let mut frame = MBusFrame {
        frame_type: MBusFrameType::Long,
        control: MBUS_CONTROL_WAKEUP,
        address: MBUS_ADDRESS_NETWORK_LAYER,
        control_information: MBUS_CONTROL_INFO_SELECT_SLAVE,
        data,
        checksum: 0,
    };
    frame.checksum = calculate_checksum(&frame);
    frame
}

/// Builds the short REQ_UD2 data request for one meter address:
/// `10 7B <addr> <ck> 16` with `ck = (0x7B + addr) mod 256`.
pub fn request_frame(address: u8) -> MBusFrame {
    let mut frame = MBusFrame {
        frame_type: MBusFrameType::Short,
        control: MBUS_CONTROL_REQUEST,
        address,
        control_information: 0,
        data: Vec::new(),
        checksum: 0,
    };
    frame.checksum = calculate_checksum(&frame);
    frame
}
