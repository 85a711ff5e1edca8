//! # Poll Orchestrator
//!
//! This module owns the per-cycle data model (addresses, roles, readings)
//! and the [`MeterPoller`], the main entry point for polling a configured
//! set of meters over one exclusively-owned transport.
//!
//! The bus is strictly sequential, so addresses are polled one session at a
//! time in configured order. A failing address is logged and omitted from
//! the cycle's result; only a failure of the port itself aborts the cycle.

use crate::error::MBusError;
use crate::mbus::mbus_protocol::MeterSession;
use crate::mbus::serial::MBusTransport;
use crate::payload::record::MBusRecord;
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Primary bus address of one meter, written as two hex digits ("79").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeterAddress(u8);

impl MeterAddress {
    pub fn new(address: u8) -> Self {
        MeterAddress(address)
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }
}

impl fmt::Display for MeterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

impl FromStr for MeterAddress {
    type Err = MBusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u8::from_str_radix(s.trim(), 16)
            .map(MeterAddress)
            .map_err(|_| MBusError::InvalidAddress(s.to_string()))
    }
}

impl TryFrom<String> for MeterAddress {
    type Error = MBusError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MeterAddress> for String {
    fn from(address: MeterAddress) -> String {
        address.to_string()
    }
}

/// Semantic role of one measurement within a reading.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementRole {
    Energy,
    Volume,
    FlowRate,
    TempIn,
    TempOut,
}

impl fmt::Display for MeasurementRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasurementRole::Energy => "energy",
            MeasurementRole::Volume => "volume",
            MeasurementRole::FlowRate => "flow_rate",
            MeasurementRole::TempIn => "temp_in",
            MeasurementRole::TempOut => "temp_out",
        };
        f.write_str(name)
    }
}

/// Binds one record position to a role, with the unit divisor and rounding
/// precision applied when building a reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRole {
    pub index: usize,
    pub role: MeasurementRole,
    #[serde(default = "default_divisor")]
    pub divisor: f64,
    #[serde(default)]
    pub decimals: u32,
}

fn default_divisor() -> f64 {
    1.0
}

/// Explicit record-position-to-role table for one meter model.
///
/// Record positions are stable per model but carry no role tag on the wire,
/// so the convention lives here as data rather than as indexing scattered
/// through the decode path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordMap {
    entries: Vec<RecordRole>,
}

/// Role table for the Pulsar heat meter: the energy counter is reported in
/// a vendor unit converted to MWh by the 1_163_000 divisor.
pub static PULSAR_RECORD_MAP: Lazy<RecordMap> = Lazy::new(|| {
    RecordMap::new(vec![
        RecordRole {
            index: 0,
            role: MeasurementRole::Energy,
            divisor: 1_163_000.0,
            decimals: 3,
        },
        RecordRole {
            index: 2,
            role: MeasurementRole::Volume,
            divisor: 1.0,
            decimals: 0,
        },
        RecordRole {
            index: 4,
            role: MeasurementRole::FlowRate,
            divisor: 1.0,
            decimals: 3,
        },
        RecordRole {
            index: 5,
            role: MeasurementRole::TempIn,
            divisor: 1.0,
            decimals: 0,
        },
        RecordRole {
            index: 6,
            role: MeasurementRole::TempOut,
            divisor: 1.0,
            decimals: 0,
        },
    ])
});

impl Default for RecordMap {
    fn default() -> Self {
        PULSAR_RECORD_MAP.clone()
    }
}

impl RecordMap {
    pub fn new(entries: Vec<RecordRole>) -> Self {
        RecordMap { entries }
    }

    pub fn entries(&self) -> &[RecordRole] {
        &self.entries
    }

    /// Builds a reading from decoded records, scaling and rounding each
    /// mapped position. A mapped position absent from the records (or
    /// holding a non-numeric value) fails the whole reading.
    pub fn apply(&self, records: &[MBusRecord]) -> Result<MeterReading, MBusError> {
        let mut values = BTreeMap::new();
        for entry in &self.entries {
            let record = records
                .iter()
                .find(|r| r.index == entry.index)
                .ok_or(MBusError::MissingRecord { index: entry.index })?;
            let value = record
                .numeric()
                .ok_or(MBusError::MissingRecord { index: entry.index })?;
            values.insert(entry.role, round_to(value / entry.divisor, entry.decimals));
        }
        Ok(MeterReading { values })
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// One meter's measurements for one poll cycle, keyed by role. Immutable
/// once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MeterReading {
    values: BTreeMap<MeasurementRole, f64>,
}

impl MeterReading {
    pub fn get(&self, role: MeasurementRole) -> Option<f64> {
        self.values.get(&role).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeasurementRole, f64)> + '_ {
        self.values.iter().map(|(&role, &value)| (role, value))
    }
}

/// Successful readings of one poll cycle, keyed by address. Addresses that
/// failed are simply absent.
pub type PollResult = HashMap<MeterAddress, MeterReading>;

/// Host-facing configuration for a polling driver instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Serial port path, e.g. "/dev/ttyUSB0".
    pub port: String,
    /// Addresses polled in order each cycle.
    pub addresses: Vec<MeterAddress>,
    /// Seconds between cycles when the host runs a timer loop.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Record-position-to-role table; defaults to the Pulsar map.
    #[serde(default)]
    pub record_map: RecordMap,
}

/// Iterates the configured addresses, one session per address, on one
/// exclusively-owned transport.
pub struct MeterPoller<T: MBusTransport> {
    transport: T,
    addresses: Vec<MeterAddress>,
    map: RecordMap,
}

impl<T: MBusTransport> MeterPoller<T> {
    pub fn new(transport: T, addresses: Vec<MeterAddress>, map: RecordMap) -> Self {
        MeterPoller {
            transport,
            addresses,
            map,
        }
    }

    /// Poller with the default Pulsar record map.
    pub fn with_default_map(transport: T, addresses: Vec<MeterAddress>) -> Self {
        Self::new(transport, addresses, RecordMap::default())
    }

    pub fn addresses(&self) -> &[MeterAddress] {
        &self.addresses
    }

    /// Runs one full poll cycle.
    ///
    /// Per-address failures are logged and leave that address out of the
    /// result; only a bus-fatal error (the port itself is unusable) aborts
    /// the cycle and propagates.
    pub async fn poll_all(&mut self) -> Result<PollResult, MBusError> {
        let mut result = PollResult::new();

        for &address in &self.addresses {
            let mut session = MeterSession::new(address);
            match session.poll(&mut self.transport, &self.map).await {
                Ok(reading) => {
                    result.insert(address, reading);
                }
                Err(e) if e.is_bus_fatal() => return Err(e),
                Err(e) => warn!("poll of meter {address} failed: {e}"),
            }
        }

        Ok(result)
    }

    /// Releases the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }
}
