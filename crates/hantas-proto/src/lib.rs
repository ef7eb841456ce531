//! Wire framing and codecs for Hantas torque tool/meter protocols.
//!
//! This crate is pure: no I/O, no async, no clock. It covers the bottom
//! three components of the device-communication stack:
//!
//! - [`ring_buffer`] — a fixed-capacity circular byte store (C1).
//! - [`reader`] — a positional big-endian decoder (C2).
//! - [`crc`] — MODBUS CRC-16 and additive checksum (C3).
//! - [`frame`] — per-transport-variant frame reassembly (C4).
//! - [`codec`] — typed decoders for device info, status, event, graph, and
//!   calibration records (C5).
//! - [`request`] — the mirror-image outgoing request-frame builders used by
//!   the pipeline crate to serialize what it enqueues.

pub mod codec;
pub mod crc;
pub mod error;
pub mod frame;
pub mod opcode;
pub mod reader;
pub mod request;
pub mod ring_buffer;

pub use error::{ProtocolError, Result};
pub use frame::{Envelope, Framer, FramerConfig, FramerOutcome};
pub use opcode::{FunctionCode, VendorCommand};
pub use reader::ByteReader;
pub use ring_buffer::RingBuffer;
