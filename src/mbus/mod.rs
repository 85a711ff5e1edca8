//! The mbus module contains the core M-Bus protocol implementation: frame
//! parsing and packing, the serial transport, and the per-meter handshake
//! session.

pub mod frame;
pub mod mbus_protocol;
pub mod serial;
pub mod serial_mock;

pub use frame::{MBusFrame, MBusFrameType};
pub use mbus_protocol::{MeterSession, SessionState};
pub use serial::{MBusTransport, SerialConfig, SerialTransport};
