//! # M-Bus Data Encoding and Decoding
//!
//! Decoders for the value encodings found inside M-Bus data records. Wired
//! M-Bus transmits multi-byte values least-significant byte first, so every
//! decoder here consumes its input in wire (little-endian) order.

use chrono::{NaiveDate, NaiveDateTime};

/// Errors local to value decoding; the record parser wraps them with the
/// payload offset they occurred at.
#[derive(Debug, thiserror::Error)]
pub enum DataDecodeError {
    #[error("non-decimal BCD nibble in byte 0x{0:02X}")]
    InvalidBcdNibble(u8),
    #[error("unsupported value width: {0} bytes")]
    UnsupportedWidth(usize),
}

/// Decodes a binary-coded decimal value of any supported width (1-8 bytes,
/// LSB first) to an unsigned integer.
pub fn decode_bcd(input: &[u8]) -> Result<u64, DataDecodeError> {
    if input.is_empty() || input.len() > 8 {
        return Err(DataDecodeError::UnsupportedWidth(input.len()));
    }

    let mut value: u64 = 0;
    for &byte in input.iter().rev() {
        let high = (byte >> 4) & 0x0F;
        let low = byte & 0x0F;
        if high > 9 || low > 9 {
            return Err(DataDecodeError::InvalidBcdNibble(byte));
        }
        value = value * 100 + u64::from(high) * 10 + u64::from(low);
    }
    Ok(value)
}

/// Decodes a little-endian signed integer of 1, 2, 3, 4, 6 or 8 bytes.
pub fn decode_int_le(input: &[u8]) -> Result<i64, DataDecodeError> {
    if !matches!(input.len(), 1 | 2 | 3 | 4 | 6 | 8) {
        return Err(DataDecodeError::UnsupportedWidth(input.len()));
    }

    let mut value: u64 = 0;
    for (i, &byte) in input.iter().enumerate() {
        value |= u64::from(byte) << (8 * i);
    }

    // Sign-extend from the value's top bit.
    let bits = input.len() * 8;
    if bits < 64 && (value >> (bits - 1)) & 1 == 1 {
        value |= u64::MAX << bits;
    }
    Ok(value as i64)
}

/// Decodes a 32-bit IEEE 754 value from 4 little-endian bytes.
pub fn decode_real_le(input: &[u8]) -> Result<f32, DataDecodeError> {
    let bytes: [u8; 4] = input
        .try_into()
        .map_err(|_| DataDecodeError::UnsupportedWidth(input.len()))?;
    Ok(f32::from_le_bytes(bytes))
}

/// Decodes a type-G compound date (CP16): day/month in the low bits, year
/// split across the top bits of both bytes.
pub fn decode_type_g_date(input: &[u8]) -> Option<NaiveDate> {
    if input.len() != 2 {
        return None;
    }
    let day = u32::from(input[0] & 0x1F);
    let month = u32::from(input[1] & 0x0F);
    let year = 2000 + i32::from(((input[0] & 0xE0) >> 5) | ((input[1] & 0xF0) >> 1));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Decodes a type-F compound date and time (CP32): minute, hour, day, month
/// and split year, with the invalid flag in the top bit of the first byte.
pub fn decode_type_f_datetime(input: &[u8]) -> Option<NaiveDateTime> {
    if input.len() != 4 || input[0] & 0x80 != 0 {
        return None;
    }
    let minute = u32::from(input[0] & 0x3F);
    let hour = u32::from(input[1] & 0x1F);
    let day = u32::from(input[2] & 0x1F);
    let month = u32::from(input[3] & 0x0F);
    let year = 2000 + i32::from(((input[2] & 0xE0) >> 5) | ((input[3] & 0xF0) >> 1));
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

/// Decodes the 2-byte manufacturer ID into its 3-letter code.
pub fn decode_manufacturer(input: &[u8; 2]) -> String {
    let mut id = u32::from(u16::from_le_bytes(*input));
    let mut manufacturer = String::with_capacity(3);

    manufacturer.push(char::from_u32((id / (32 * 32)) + 64).unwrap_or('?'));
    id %= 32 * 32;
    manufacturer.push(char::from_u32((id / 32) + 64).unwrap_or('?'));
    id %= 32;
    manufacturer.push(char::from_u32(id + 64).unwrap_or('?'));

    manufacturer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_single_byte() {
        assert_eq!(decode_bcd(&[0x45]).unwrap(), 45);
    }

    #[test]
    fn bcd_multi_byte_lsb_first() {
        // 1500 on the wire: 0x00 0x15 little-endian BCD
        assert_eq!(decode_bcd(&[0x00, 0x15]).unwrap(), 1500);
        assert_eq!(decode_bcd(&[0x45, 0x23, 0x01]).unwrap(), 12345);
        assert_eq!(decode_bcd(&[0x78, 0x56, 0x34, 0x12]).unwrap(), 12345678);
    }

    #[test]
    fn bcd_rejects_hex_nibbles() {
        assert!(matches!(
            decode_bcd(&[0x1A]),
            Err(DataDecodeError::InvalidBcdNibble(0x1A))
        ));
    }

    #[test]
    fn int_le_positive() {
        assert_eq!(decode_int_le(&[0x78]).unwrap(), 0x78);
        assert_eq!(decode_int_le(&[0x34, 0x12]).unwrap(), 0x1234);
        assert_eq!(decode_int_le(&[0x78, 0x56, 0x34, 0x12]).unwrap(), 0x12345678);
    }

    #[test]
    fn int_le_sign_extends() {
        assert_eq!(decode_int_le(&[0xFF]).unwrap(), -1);
        assert_eq!(decode_int_le(&[0xFE, 0xFF]).unwrap(), -2);
        assert_eq!(decode_int_le(&[0xFF, 0xFF, 0xFF, 0x7F]).unwrap(), i32::MAX as i64);
    }

    #[test]
    fn int_le_rejects_bad_width() {
        assert!(decode_int_le(&[1, 2, 3, 4, 5]).is_err());
        assert!(decode_int_le(&[]).is_err());
    }

    #[test]
    fn real_le_roundtrip() {
        let bytes = 0.45f32.to_le_bytes();
        assert_eq!(decode_real_le(&bytes).unwrap(), 0.45);
    }

    #[test]
    fn type_g_date() {
        // 2023-05-14: day=14, month=5, year=23 -> hi bits 0b10111
        let day = 14u8 | ((23 & 0x07) << 5);
        let month = 5u8 | (((23 & 0x78) >> 3) << 4);
        let date = decode_type_g_date(&[day, month]).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 5, 14).unwrap());
    }

    #[test]
    fn manufacturer_code() {
        // "PAD" encodes as 0x4024 -> bytes 24 40 on the wire
        assert_eq!(decode_manufacturer(&[0x24, 0x40]), "PAD");
    }
}
