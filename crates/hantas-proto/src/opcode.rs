//! Function codes and vendor command bytes (§6).

/// Modbus function codes used on the wire, shared by the RTU and TCP (MBAP)
/// framers. `ReadInfo`, `Graph`, `GraphRes`, and `HighResGraph` are Hantas
/// vendor extensions layered on the same one-byte opcode space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FunctionCode {
    /// 0x03 — read holding registers.
    ReadHolding,
    /// 0x04 — read input registers.
    ReadInput,
    /// 0x06 — write a single register.
    WriteSingle,
    /// 0x10 — write multiple registers.
    WriteMulti,
    /// 0x11 — vendor: read device info block.
    ReadInfo,
    /// 0x64 — vendor: graph request.
    Graph,
    /// 0x65 — vendor: graph response.
    GraphRes,
    /// 0x66 — vendor: high-resolution graph.
    HighResGraph,
}

impl FunctionCode {
    /// The bit a Modbus exception response OR's into the request's function
    /// code.
    pub const EXCEPTION_BIT: u8 = 0x80;

    /// Raw wire byte for this function code.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReadHolding => 0x03,
            Self::ReadInput => 0x04,
            Self::WriteSingle => 0x06,
            Self::WriteMulti => 0x10,
            Self::ReadInfo => 0x11,
            Self::Graph => 0x64,
            Self::GraphRes => 0x65,
            Self::HighResGraph => 0x66,
        }
    }

    /// Recognizes a raw wire byte. The exception bit must already be
    /// stripped by the caller (see [`Self::strip_exception`]).
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x03 => Some(Self::ReadHolding),
            0x04 => Some(Self::ReadInput),
            0x06 => Some(Self::WriteSingle),
            0x10 => Some(Self::WriteMulti),
            0x11 => Some(Self::ReadInfo),
            0x64 => Some(Self::Graph),
            0x65 => Some(Self::GraphRes),
            0x66 => Some(Self::HighResGraph),
            _ => None,
        }
    }

    /// True if `byte` carries the exception bit (`byte & 0x80 != 0`).
    #[must_use]
    pub fn is_exception(byte: u8) -> bool {
        byte & Self::EXCEPTION_BIT != 0
    }

    /// Strips the exception bit, returning the base function code byte.
    #[must_use]
    pub fn strip_exception(byte: u8) -> u8 {
        byte & !Self::EXCEPTION_BIT
    }

    /// Maximum register count for a single read-holding/read-input request.
    pub const MAX_READ_REGISTERS: u16 = 125;

    /// Maximum register count for a single write-multi request.
    pub const MAX_WRITE_REGISTERS: u16 = 123;
}

/// Command byte used by the vendor framed-serial protocol
/// (`[0x5A, 0xA5, len_lo, len_hi, command, payload...]`). This is a
/// different byte-space from [`FunctionCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VendorCommand {
    /// 0x00 — request calibration data.
    ReqCalData,
    /// 0x01 — request a calibration set point.
    ReqCalSetPoint,
    /// 0x02 — request calibration save.
    ReqCalSave,
    /// 0x03 — request calibration terminate.
    ReqCalTerminate,
    /// 0x04 — request a settings write.
    ReqSetData,
    /// 0x05 — request a torque stream.
    ReqTorque,
    /// 0xA0 — ADC reply (unsolicited status-like frame).
    RepAdc,
}

impl VendorCommand {
    /// Bit a vendor-serial response OR's into the request's command byte.
    pub const RESPONSE_BIT: u8 = 0x80;

    /// Raw wire byte for this command.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReqCalData => 0x00,
            Self::ReqCalSetPoint => 0x01,
            Self::ReqCalSave => 0x02,
            Self::ReqCalTerminate => 0x03,
            Self::ReqSetData => 0x04,
            Self::ReqTorque => 0x05,
            Self::RepAdc => 0xA0,
        }
    }

    /// Recognizes a raw wire byte (request form; responses are
    /// `to_u8() | RESPONSE_BIT` and are matched by the pipeline's response
    /// router, not by this lookup).
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::ReqCalData),
            0x01 => Some(Self::ReqCalSetPoint),
            0x02 => Some(Self::ReqCalSave),
            0x03 => Some(Self::ReqCalTerminate),
            0x04 => Some(Self::ReqSetData),
            0x05 => Some(Self::ReqTorque),
            0xA0 => Some(Self::RepAdc),
            _ => None,
        }
    }

    /// The reply-form byte the pipeline matches against the queue head:
    /// `request | RESPONSE_BIT`.
    #[must_use]
    pub fn reply_byte(self) -> u8 {
        self.to_u8() | Self::RESPONSE_BIT
    }
}
