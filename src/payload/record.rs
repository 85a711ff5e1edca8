//! # M-Bus Data Record Decoder
//!
//! Interprets the payload of a variable-data response as an ordered sequence
//! of typed records. Each record is self-describing: a data-information byte
//! (storage size and numeric representation), a value-information byte (unit
//! and scaling exponent), then that many value bytes.
//!
//! The decoder normalizes every numeric value by its VIF exponent and keeps
//! records in wire order. It assigns no semantic roles: mapping a record
//! position to energy/volume/temperature is the caller's convention (see
//! [`crate::poller::RecordMap`]) and is deliberately kept out of this layer.

use crate::constants::*;
use crate::error::MBusError;
use crate::payload::data_encoding::{
    decode_bcd, decode_int_le, decode_manufacturer, decode_real_le, decode_type_f_datetime,
    decode_type_g_date, DataDecodeError,
};
use crate::payload::vif::normalize_vif;

/// One decoded data record.
#[derive(Debug, Clone, PartialEq)]
pub struct MBusRecord {
    /// Position within the payload, counting produced records from zero.
    pub index: usize,
    pub dif: u8,
    pub vif: u8,
    pub value: MBusRecordValue,
    pub unit: &'static str,
    pub quantity: &'static str,
}

/// Represents the value of an M-Bus data record.
#[derive(Debug, Clone, PartialEq)]
pub enum MBusRecordValue {
    Numeric(f64),
    String(String),
}

impl MBusRecord {
    /// Numeric value of the record, if it has one.
    pub fn numeric(&self) -> Option<f64> {
        match self.value {
            MBusRecordValue::Numeric(v) => Some(v),
            MBusRecordValue::String(_) => None,
        }
    }
}

/// Fixed 12-byte header preceding the record block in a variable-data
/// response (CI 0x72).
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDataHeader {
    pub ident: u64,
    pub manufacturer: String,
    pub version: u8,
    pub medium: u8,
    pub access_number: u8,
    pub status: u8,
    pub signature: u16,
}

fn malformed(offset: usize, reason: impl Into<String>) -> MBusError {
    MBusError::MalformedRecord {
        offset,
        reason: reason.into(),
    }
}

fn wrap_decode(offset: usize, err: DataDecodeError) -> MBusError {
    malformed(offset, err.to_string())
}

/// Parses the full payload of a variable-data response: fixed header, then
/// the record block.
pub fn parse_variable_payload(
    data: &[u8],
) -> Result<(VariableDataHeader, Vec<MBusRecord>), MBusError> {
    if data.len() < MBUS_VARIABLE_HEADER_LENGTH {
        return Err(malformed(0, "variable-data header truncated"));
    }

    let header = VariableDataHeader {
        ident: decode_bcd(&data[0..4]).map_err(|e| wrap_decode(0, e))?,
        manufacturer: decode_manufacturer(&[data[4], data[5]]),
        version: data[6],
        medium: data[7],
        access_number: data[8],
        status: data[9],
        signature: u16::from_le_bytes([data[10], data[11]]),
    };

    let records = parse_records(&data[MBUS_VARIABLE_HEADER_LENGTH..])?;
    Ok((header, records))
}

/// Parses the data-record block sequentially until the payload is exhausted
/// or a manufacturer-specific block ends structured data.
pub fn parse_records(block: &[u8]) -> Result<Vec<MBusRecord>, MBusError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < block.len() {
        let dif = block[offset];

        if dif == MBUS_DIB_DIF_IDLE_FILLER {
            offset += 1;
            continue;
        }
        // Everything after these markers is unstructured vendor data or a
        // multi-telegram signal; neither occurs in a Pulsar response.
        if dif == MBUS_DIB_DIF_MANUFACTURER_SPECIFIC || dif == MBUS_DIB_DIF_MORE_RECORDS_FOLLOW {
            break;
        }

        let record = parse_one_record(block, &mut offset, records.len())?;
        records.push(record);
    }

    Ok(records)
}

fn parse_one_record(
    block: &[u8],
    offset: &mut usize,
    index: usize,
) -> Result<MBusRecord, MBusError> {
    let record_start = *offset;
    let dif = block[*offset];
    *offset += 1;

    // DIFE chain: each extension byte may chain another.
    let mut extension = dif & MBUS_DIB_DIF_EXTENSION_BIT != 0;
    let mut chain_len = 0;
    while extension {
        let dife = *block
            .get(*offset)
            .ok_or_else(|| malformed(record_start, "truncated DIFE chain"))?;
        *offset += 1;
        chain_len += 1;
        if chain_len > 10 {
            return Err(malformed(record_start, "DIFE chain exceeds 10 bytes"));
        }
        extension = dife & MBUS_DIB_DIF_EXTENSION_BIT != 0;
    }

    let vif_raw = *block
        .get(*offset)
        .ok_or_else(|| malformed(record_start, "record ends before VIF"))?;
    *offset += 1;
    let vif = vif_raw & MBUS_DIB_VIF_WITHOUT_EXTENSION;

    // Custom ASCII unit: a length-prefixed string replaces the VIF table
    // entry. The text is consumed; the value stays unscaled.
    if vif == 0x7C {
        let text_len = *block
            .get(*offset)
            .ok_or_else(|| malformed(record_start, "custom VIF without length byte"))?
            as usize;
        *offset += 1;
        if *offset + text_len > block.len() {
            return Err(malformed(record_start, "custom VIF text truncated"));
        }
        *offset += text_len;
    }

    // VIFE chain.
    let mut extension = vif_raw & MBUS_DIB_VIF_EXTENSION_BIT != 0;
    let mut chain_len = 0;
    while extension {
        let vife = *block
            .get(*offset)
            .ok_or_else(|| malformed(record_start, "truncated VIFE chain"))?;
        *offset += 1;
        chain_len += 1;
        if chain_len > 10 {
            return Err(malformed(record_start, "VIFE chain exceeds 10 bytes"));
        }
        extension = vife & MBUS_DIB_VIF_EXTENSION_BIT != 0;
    }

    // Value length from the DIF low nibble; 0x0D means a length byte leads
    // the value itself.
    let value_len = match dif & MBUS_DATA_RECORD_DIF_MASK_DATA {
        0x0 | 0x8 => 0,
        0x1 => 1,
        0x2 => 2,
        0x3 => 3,
        0x4 | 0x5 => 4,
        0x6 | 0xE => 6,
        0x7 => 8,
        0x9 => 1,
        0xA => 2,
        0xB => 3,
        0xC => 4,
        0xD => {
            let len = *block
                .get(*offset)
                .ok_or_else(|| malformed(record_start, "variable-length record without LVAR"))?
                as usize;
            *offset += 1;
            len
        }
        nibble => return Err(MBusError::UnknownDif(nibble)),
    };

    if *offset + value_len > block.len() {
        return Err(malformed(
            record_start,
            format!(
                "record declares {value_len} value bytes, {} remain",
                block.len() - *offset
            ),
        ));
    }
    let raw = &block[*offset..*offset + value_len];
    *offset += value_len;

    let info = normalize_vif(vif)?;
    let value = decode_value(dif, vif, raw).map_err(|e| wrap_decode(record_start, e))?;
    let value = match value {
        MBusRecordValue::Numeric(v) => MBusRecordValue::Numeric(v * info.exponent),
        other => other,
    };

    Ok(MBusRecord {
        index,
        dif,
        vif,
        value,
        unit: info.unit,
        quantity: info.quantity,
    })
}

/// Decodes the raw value bytes according to the DIF encoding nibble, with
/// the date VIFs rendered as calendar strings.
fn decode_value(dif: u8, vif: u8, raw: &[u8]) -> Result<MBusRecordValue, DataDecodeError> {
    // Time points carry encoded dates regardless of the integer DIF.
    if vif == 0x6C {
        return Ok(match decode_type_g_date(raw) {
            Some(date) => MBusRecordValue::String(date.to_string()),
            None => MBusRecordValue::String(String::new()),
        });
    }
    if vif == 0x6D {
        return Ok(match decode_type_f_datetime(raw) {
            Some(ts) => MBusRecordValue::String(ts.to_string()),
            None => MBusRecordValue::String(String::new()),
        });
    }

    match dif & MBUS_DATA_RECORD_DIF_MASK_DATA {
        0x0 | 0x8 => Ok(MBusRecordValue::Numeric(0.0)),
        0x1 | 0x2 | 0x3 | 0x4 | 0x6 | 0x7 => {
            Ok(MBusRecordValue::Numeric(decode_int_le(raw)? as f64))
        }
        0x5 => Ok(MBusRecordValue::Numeric(f64::from(decode_real_le(raw)?))),
        0x9 | 0xA | 0xB | 0xC | 0xE => Ok(MBusRecordValue::Numeric(decode_bcd(raw)? as f64)),
        0xD => {
            // LVAR text arrives last character first.
            let text: String = raw.iter().rev().map(|&b| b as char).collect();
            Ok(MBusRecordValue::String(text))
        }
        nibble => Err(DataDecodeError::UnsupportedWidth(nibble as usize)),
    }
}
