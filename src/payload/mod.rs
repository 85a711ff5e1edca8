//! The payload module contains the components responsible for decoding the
//! data payload of a variable-data response: value encodings, VIF
//! normalization, and the record walk itself.

pub mod data_encoding;
pub mod record;
pub mod vif;

pub use record::{
    parse_records, parse_variable_payload, MBusRecord, MBusRecordValue, VariableDataHeader,
};
pub use vif::{lookup_primary_vif, normalize_vif, VifInfo};
