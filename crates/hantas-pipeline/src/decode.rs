//! Decode dispatch (spec.md §4.8/§6): turns a reassembled [`Envelope`] into a
//! strongly-typed [`DecodedRecord`], branching on the opcode byte and, where
//! the opcode alone is ambiguous, on payload length.
//!
//! Two asymmetries drive this module, both visible in `hantas-proto`'s own
//! framers rather than invented here:
//!
//! - RTU/TCP `ReadHolding`/`ReadInput`/`ReadInfo` payloads carry a leading
//!   byte-count byte before the actual data (see `frame::rtu`/`frame::tcp`'s
//!   `header_len`/`HEADER_LEN` slicing); vendor-serial payloads do not (see
//!   `frame::vendor`'s `frame[5..total]` slicing). Register-shaped payloads
//!   are stripped of that leading byte before decoding; vendor payloads are
//!   decoded as-is.
//! - A `ReadHolding`/`ReadInput` reply is a [`Status`] snapshot or a plain
//!   register list depending on length alone: `Status::expected_len` for the
//!   connection's configured generation tells them apart.

use bytes::Bytes;
use hantas_proto::{
    FunctionCode, VendorCommand,
    codec::{CalData, DeviceInfo, Graph, SimpleInfo, Status, StatusGeneration},
};

use crate::error::PipelineError;

/// A decoded wire record, tagged by what it actually is rather than by the
/// opcode it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    /// Plain register words from a read reply that isn't a recognized
    /// fixed-layout record.
    Registers(Vec<u16>),
    /// Gen2 200-byte device info block.
    DeviceInfo(DeviceInfo),
    /// Legacy 13-byte device info record.
    SimpleInfo(SimpleInfo),
    /// Tool status snapshot.
    Status(Status),
    /// Captured torque/angle time series.
    Graph(Graph),
    /// Calibration data for one reference point.
    CalData(CalData),
    /// A live torque-stream sample (vendor-serial `ReqTorque` reply).
    Torque {
        /// Torque reading in `unit`.
        value: f32,
        /// Unit string as reported on the wire (e.g. `"Nm"`).
        unit: String,
    },
    /// A write or calibration command was acknowledged with no payload to
    /// decode.
    Ack,
    /// A Modbus exception response.
    Exception {
        /// Base function code the exception responds to.
        opcode: u8,
        /// Exception code from the reply body.
        code: u8,
    },
}

/// Decodes `payload` (already stripped of any length/CRC framing) arriving
/// with raw opcode byte `opcode` on `wire`, given the connection's configured
/// `status_generation`.
///
/// # Errors
/// Returns [`PipelineError::UnknownOpcode`] if `opcode` matches neither a
/// [`FunctionCode`] nor a [`VendorCommand`], and propagates any
/// [`hantas_proto::ProtocolError`] a fixed-layout decoder raises.
pub fn decode(
    opcode: u8,
    payload: &Bytes,
    wire: &'static str,
    status_generation: StatusGeneration,
) -> Result<DecodedRecord, PipelineError> {
    if FunctionCode::is_exception(opcode) {
        let base = FunctionCode::strip_exception(opcode);
        let code = payload.first().copied().unwrap_or(0);
        return Ok(DecodedRecord::Exception { opcode: base, code });
    }

    if let Some(function) = FunctionCode::from_u8(opcode) {
        return decode_modbus(function, payload, status_generation);
    }

    let base = VendorCommand::from_u8(opcode & !VendorCommand::RESPONSE_BIT);
    match base {
        Some(command) => decode_vendor(command, payload),
        None => Err(PipelineError::UnknownOpcode { opcode, wire }),
    }
}

fn decode_modbus(
    function: FunctionCode,
    payload: &Bytes,
    status_generation: StatusGeneration,
) -> Result<DecodedRecord, PipelineError> {
    match function {
        FunctionCode::ReadHolding | FunctionCode::ReadInput => {
            let data = strip_byte_count(payload)?;
            if data.len() == Status::expected_len(status_generation) {
                Ok(DecodedRecord::Status(Status::from_bytes(data, status_generation)?))
            } else {
                Ok(DecodedRecord::Registers(words_be(data)))
            }
        },
        FunctionCode::ReadInfo => {
            let data = strip_byte_count(payload)?;
            match data.len() {
                hantas_proto::codec::info::INFO_BYTE_LEN_GEN2 => {
                    Ok(DecodedRecord::DeviceInfo(DeviceInfo::from_bytes(data)?))
                },
                13 => Ok(DecodedRecord::SimpleInfo(SimpleInfo::from_bytes(data)?)),
                actual => Err(hantas_proto::ProtocolError::UnexpectedLength {
                    expected: hantas_proto::codec::info::INFO_BYTE_LEN_GEN2,
                    actual,
                }
                .into()),
            }
        },
        FunctionCode::WriteSingle | FunctionCode::WriteMulti => Ok(DecodedRecord::Ack),
        FunctionCode::Graph | FunctionCode::GraphRes | FunctionCode::HighResGraph => {
            Ok(DecodedRecord::Graph(Graph::from_bytes(payload)?))
        },
    }
}

fn decode_vendor(command: VendorCommand, payload: &Bytes) -> Result<DecodedRecord, PipelineError> {
    match command {
        VendorCommand::ReqCalData => Ok(DecodedRecord::CalData(CalData::from_bytes(payload)?)),
        VendorCommand::ReqCalSetPoint
        | VendorCommand::ReqCalSave
        | VendorCommand::ReqCalTerminate
        | VendorCommand::ReqSetData => Ok(DecodedRecord::Ack),
        VendorCommand::ReqTorque => parse_torque_line(payload),
        VendorCommand::RepAdc => {
            // Unsolicited ADC/status-like frame; legacy devices only ever
            // speak Gen1-shaped status, so that's the one generation worth
            // trying opportunistically rather than failing outright.
            Ok(DecodedRecord::Status(Status::from_bytes(payload, StatusGeneration::Gen1)?))
        },
    }
}

/// Strips the leading byte-count byte RTU/TCP register-read payloads carry,
/// validating it against the remaining length.
fn strip_byte_count(payload: &Bytes) -> Result<&[u8], PipelineError> {
    let Some((&count, data)) = payload.split_first() else {
        return Err(hantas_proto::ProtocolError::Truncated { needed: 1, have: 0 }.into());
    };
    if usize::from(count) != data.len() {
        return Err(hantas_proto::ProtocolError::UnexpectedLength {
            expected: usize::from(count),
            actual: data.len(),
        }
        .into());
    }
    Ok(data)
}

fn words_be(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect()
}

/// Parses a vendor torque-stream line: ASCII `"value,unit"`, optionally
/// terminated by `\r\n`.
fn parse_torque_line(payload: &Bytes) -> Result<DecodedRecord, PipelineError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| PipelineError::MalformedTorqueLine("not valid utf-8".into()))?;
    let trimmed = text.trim_end_matches(['\r', '\n']);
    let (value_str, unit) = trimmed
        .split_once(',')
        .ok_or_else(|| PipelineError::MalformedTorqueLine(trimmed.to_string()))?;
    let value = value_str
        .parse::<f32>()
        .map_err(|_| PipelineError::MalformedTorqueLine(trimmed.to_string()))?;
    Ok(DecodedRecord::Torque { value, unit: unit.to_string() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exception_reply_is_recognized_before_opcode_dispatch() {
        let payload = Bytes::from_static(&[0x02]);
        let record =
            decode(0x83, &payload, "rtu", StatusGeneration::Gen2).unwrap();
        assert_eq!(record, DecodedRecord::Exception { opcode: 0x03, code: 0x02 });
    }

    #[test]
    fn read_holding_with_status_length_decodes_as_status() {
        let mut body = vec![Status::expected_len(StatusGeneration::Gen2) as u8];
        body.extend(vec![0u8; Status::expected_len(StatusGeneration::Gen2)]);
        let payload = Bytes::from(body);
        let record = decode(
            FunctionCode::ReadHolding.to_u8(),
            &payload,
            "rtu",
            StatusGeneration::Gen2,
        )
        .unwrap();
        assert!(matches!(record, DecodedRecord::Status(_)));
    }

    #[test]
    fn read_holding_with_other_length_decodes_as_registers() {
        let mut body = vec![4u8];
        body.extend_from_slice(&[0, 1, 0, 2]);
        let payload = Bytes::from(body);
        let record = decode(
            FunctionCode::ReadHolding.to_u8(),
            &payload,
            "rtu",
            StatusGeneration::Gen2,
        )
        .unwrap();
        assert_eq!(record, DecodedRecord::Registers(vec![1, 2]));
    }

    #[test]
    fn read_info_dispatches_on_length() {
        let mut simple_body = vec![13u8];
        simple_body.extend_from_slice(&[0x01, 0x02, 0x03, 1, 0, 0, 0x01, 0x02, 0x03, 0x04, 0x05, 0xFF, 0xFF]);
        let payload = Bytes::from(simple_body);
        let record =
            decode(FunctionCode::ReadInfo.to_u8(), &payload, "rtu", StatusGeneration::Gen2).unwrap();
        assert!(matches!(record, DecodedRecord::SimpleInfo(_)));
    }

    #[test]
    fn vendor_torque_reply_parses_ascii_line() {
        let payload = Bytes::from_static(b"12.3,Nm\r\n");
        let record = decode(
            VendorCommand::ReqTorque.reply_byte(),
            &payload,
            "vendor",
            StatusGeneration::Gen2,
        )
        .unwrap();
        assert_eq!(record, DecodedRecord::Torque { value: 12.3, unit: "Nm".to_string() });
    }

    #[test]
    fn vendor_ack_replies_decode_to_ack() {
        let payload = Bytes::new();
        let record = decode(
            VendorCommand::ReqSetData.reply_byte(),
            &payload,
            "vendor",
            StatusGeneration::Gen2,
        )
        .unwrap();
        assert_eq!(record, DecodedRecord::Ack);
    }

    #[test]
    fn unrecognized_opcode_is_reported() {
        let payload = Bytes::new();
        let err = decode(0x7F, &payload, "vendor", StatusGeneration::Gen2).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownOpcode { opcode: 0x7F, wire: "vendor" }));
    }
}
