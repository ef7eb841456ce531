//! Concrete I/O adapters for the three transport variants the pipeline can
//! drive: serial RTU, Modbus TCP, and vendor framed serial.
//!
//! Every adapter implements the same narrow [`Transport`] capability; the
//! pipeline holds one as `Box<dyn Transport>` and never branches on which
//! concrete type it is.

pub mod error;
pub mod rtu;
pub mod tcp;
pub mod transport;
pub mod vendor;

pub use error::TransportError;
pub use rtu::{RtuConfig, RtuTransport};
pub use tcp::{TcpConfig, TcpTransport};
pub use transport::{PERMITTED_BAUD_RATES, Transport, clamp_device_id, validate_baud_rate};
pub use vendor::VendorSerialTransport;
