//! Per-transport-variant framing and request-building, unified behind a
//! tagged sum rather than a third generic type parameter on
//! [`crate::pipeline::Pipeline`] (spec.md §9 design note: "model a narrow
//! interface plus a tagged sum when the pipeline needs per-variant branching
//! (frame header offsets)").
//!
//! [`hantas_proto::frame::FrameVariant::try_extract`] is an associated
//! function with no `&self`, which makes `Framer<V, _>` awkward to use
//! behind `dyn`; [`AnyFramer`] sidesteps that by holding one concrete
//! `Framer` per variant and dispatching by hand in [`AnyFramer::accept`].

use bytes::Bytes;
use hantas_proto::{
    FunctionCode, VendorCommand,
    frame::{Framer, FramerConfig, FramerOutcome, rtu::RtuVariant, tcp::TcpVariant, vendor::VendorVariant},
    ring_buffer::RingBuffer,
    request,
};

/// Which wire variant a [`crate::pipeline::Pipeline`] speaks. Selects both
/// framing (via [`AnyFramer`]) and outgoing request-byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    /// Modbus RTU over a serial line.
    Rtu,
    /// Modbus TCP (MBAP).
    Tcp,
    /// Hantas vendor framed-serial protocol.
    Vendor,
}

impl WireKind {
    /// Short tag used in [`crate::error::PipelineError::UnknownOpcode`].
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Rtu => "rtu",
            Self::Tcp => "tcp",
            Self::Vendor => "vendor",
        }
    }
}

/// One framer per wire variant, selected once at construction and driven for
/// the lifetime of the pipeline.
pub enum AnyFramer<I> {
    /// Modbus RTU framer.
    Rtu(Framer<RtuVariant, I>),
    /// Modbus TCP (MBAP) framer.
    Tcp(Framer<TcpVariant, I>),
    /// Vendor framed-serial framer.
    Vendor(Framer<VendorVariant, I>),
}

impl<I> AnyFramer<I>
where
    I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
{
    /// Builds the framer matching `kind`, all with the same `config`.
    #[must_use]
    pub fn new(kind: WireKind, config: FramerConfig) -> Self {
        match kind {
            WireKind::Rtu => Self::Rtu(Framer::new(config)),
            WireKind::Tcp => Self::Tcp(Framer::new(config)),
            WireKind::Vendor => Self::Vendor(Framer::new(config)),
        }
    }

    /// Attempts one extraction from `buf`, dispatching to the held variant.
    pub fn accept(&mut self, buf: &mut RingBuffer, now: I) -> FramerOutcome {
        match self {
            Self::Rtu(framer) => framer.accept(buf, now),
            Self::Tcp(framer) => framer.accept(buf, now),
            Self::Vendor(framer) => framer.accept(buf, now),
        }
    }
}

/// One outgoing request, serialized for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    /// Opcode this request carries, used for queue-key derivation and
    /// response matching.
    pub opcode: u8,
    /// Serialized bytes ready to write to the transport.
    pub bytes: Bytes,
}

/// Monotonically increasing MBAP transaction id generator. TCP is the only
/// variant whose framing includes a transaction id; RTU and vendor serial
/// ignore it.
#[derive(Debug, Clone, Default)]
pub struct TransactionIdGenerator(std::sync::Arc<std::sync::atomic::AtomicU16>);

impl TransactionIdGenerator {
    /// Starts the generator at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next transaction id, wrapping at `u16::MAX`.
    pub fn next_id(&self) -> u16 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

/// Builds a register-read request (`ReadHolding`, `ReadInput`, or
/// `ReadInfo`) for `kind`.
#[must_use]
pub fn build_read(
    kind: WireKind,
    transactions: &TransactionIdGenerator,
    device_id: u8,
    function: FunctionCode,
    address: u16,
    count: u16,
) -> OutgoingRequest {
    let bytes = match kind {
        WireKind::Rtu => request::rtu_read(device_id, function, address, count),
        WireKind::Tcp => request::tcp_read(transactions.next_id(), device_id, function, address, count),
        WireKind::Vendor => {
            let mut payload = Vec::with_capacity(4);
            payload.extend_from_slice(&address.to_be_bytes());
            payload.extend_from_slice(&count.to_be_bytes());
            request::vendor_frame(vendor_command_for(function), &payload)
        },
    };
    OutgoingRequest { opcode: function.to_u8(), bytes: Bytes::from(bytes) }
}

/// Builds a `WriteSingle` request for `kind`.
#[must_use]
pub fn build_write_single(
    kind: WireKind,
    transactions: &TransactionIdGenerator,
    device_id: u8,
    address: u16,
    value: u16,
) -> OutgoingRequest {
    let bytes = match kind {
        WireKind::Rtu => request::rtu_write_single(device_id, address, value),
        WireKind::Tcp => request::tcp_write_single(transactions.next_id(), device_id, address, value),
        WireKind::Vendor => {
            let mut payload = Vec::with_capacity(4);
            payload.extend_from_slice(&address.to_be_bytes());
            payload.extend_from_slice(&value.to_be_bytes());
            request::vendor_frame(VendorCommand::ReqSetData, &payload)
        },
    };
    OutgoingRequest { opcode: FunctionCode::WriteSingle.to_u8(), bytes: Bytes::from(bytes) }
}

/// Builds a `WriteMulti` request for `kind`.
#[must_use]
pub fn build_write_multi(
    kind: WireKind,
    transactions: &TransactionIdGenerator,
    device_id: u8,
    address: u16,
    values: &[u16],
) -> OutgoingRequest {
    let bytes = match kind {
        WireKind::Rtu => request::rtu_write_multi(device_id, address, values),
        WireKind::Tcp => request::tcp_write_multi(transactions.next_id(), device_id, address, values),
        WireKind::Vendor => {
            let mut payload = Vec::with_capacity(2 + values.len() * 2);
            payload.extend_from_slice(&address.to_be_bytes());
            for value in values {
                payload.extend_from_slice(&value.to_be_bytes());
            }
            request::vendor_frame(VendorCommand::ReqSetData, &payload)
        },
    };
    OutgoingRequest { opcode: FunctionCode::WriteMulti.to_u8(), bytes: Bytes::from(bytes) }
}

/// Builds a vendor-serial-only command request (calibration control, torque
/// streaming). Not meaningful for RTU/TCP wire kinds; callers restrict these
/// to [`WireKind::Vendor`] connections.
#[must_use]
pub fn build_vendor_command(command: VendorCommand, payload: &[u8]) -> OutgoingRequest {
    OutgoingRequest { opcode: command.to_u8(), bytes: Bytes::from(request::vendor_frame(command, payload)) }
}

/// Maps a Modbus-shaped read onto the nearest vendor command, for the rare
/// case a vendor-serial connection is asked to perform a register read
/// through the Modbus-shaped API (`ReadInfo` maps onto `ReqSetData`'s
/// settings block, the closest vendor analogue; `ReadHolding`/`ReadInput`
/// map onto `ReqTorque`, the only vendor read with no request payload).
fn vendor_command_for(function: FunctionCode) -> VendorCommand {
    match function {
        FunctionCode::ReadInfo => VendorCommand::ReqSetData,
        _ => VendorCommand::ReqTorque,
    }
}

/// Response-routing rule (spec.md §4.8): whether `response_opcode` is the
/// reply to a request that carried `request_opcode`, given the wire's
/// exception/response-bit convention.
#[must_use]
pub fn reply_matches(kind: WireKind, request_opcode: u8, response_opcode: u8) -> bool {
    match kind {
        WireKind::Rtu | WireKind::Tcp => {
            response_opcode == request_opcode || FunctionCode::strip_exception(response_opcode) == request_opcode
        },
        WireKind::Vendor => response_opcode == (request_opcode | VendorCommand::RESPONSE_BIT),
    }
}
