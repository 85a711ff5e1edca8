//! # pulsar-mbus - M-Bus Polling Driver for Pulsar Heat Meters
//!
//! The pulsar-mbus crate polls utility meters over a shared serial bus using
//! the wired M-Bus (Meter-Bus) protocol, extracting physical measurements
//! (energy, volume, flow rate, temperatures) for periodic reporting to a
//! host application.
//!
//! ## Features
//!
//! - Encode the wakeup (select) and REQ_UD2 request telegrams, with
//!   computed checksums
//! - Parse and validate ACK, short, control, and long frames, keeping
//!   partial reads distinct from corrupt ones
//! - Decode variable-data payloads into typed, exponent-normalized records
//!   (BCD, little-endian integers, 32-bit reals, dates)
//! - Drive the per-meter handshake (wake, bounded ACK retries, request,
//!   data) as an explicit state machine with deterministic worst-case timing
//! - Poll a configured address list per cycle with strict per-address
//!   failure isolation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pulsar_mbus::{MeterAddress, MeterPoller, SerialTransport};
//!
//! # async fn run() -> Result<(), pulsar_mbus::MBusError> {
//! let transport = SerialTransport::connect("/dev/ttyUSB0").await?;
//! let addresses: Vec<MeterAddress> = vec!["79".parse()?, "82".parse()?];
//! let mut poller = MeterPoller::with_default_map(transport, addresses);
//! let readings = poller.poll_all().await?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod logging;
pub mod mbus;
pub mod payload;
pub mod poller;

pub use crate::error::MBusError;
pub use crate::logging::{init_logger, log_debug, log_error, log_info, log_warn};

// Core M-Bus types
pub use mbus::frame::{parse_frame, request_frame, wakeup_frame};
pub use mbus::serial::{recv_frame, send_frame};
pub use mbus::{MBusFrame, MBusFrameType, MBusTransport, MeterSession, SerialTransport, SessionState};
pub use payload::{MBusRecord, MBusRecordValue, VariableDataHeader};
pub use poller::{
    MeasurementRole, MeterAddress, MeterPoller, MeterReading, PollResult, PollerConfig, RecordMap,
};

/// Connect to the M-Bus via a serial port.
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux)
///
/// # Returns
/// * `Ok(SerialTransport)` - Exclusively-owned bus handle
/// * `Err(MBusError)` - Connection failed
pub async fn connect(port: &str) -> Result<SerialTransport, MBusError> {
    SerialTransport::connect(port).await
}

/// Run one poll cycle over the given addresses with the default Pulsar
/// record map.
///
/// # Arguments
/// * `transport` - Bus handle to poll through
/// * `addresses` - Meter addresses, polled in order
///
/// # Returns
/// * `Ok(PollResult)` - Readings keyed by address; failed addresses absent
/// * `Err(MBusError)` - The bus itself became unusable mid-cycle
pub async fn poll_once<T: MBusTransport>(
    transport: T,
    addresses: Vec<MeterAddress>,
) -> Result<PollResult, MBusError> {
    let mut poller = MeterPoller::with_default_map(transport, addresses);
    poller.poll_all().await
}
