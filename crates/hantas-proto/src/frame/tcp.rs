//! MODBUS TCP (MBAP) framer variant.
//!
//! `[tid(2), pid(2), len(2), uid(1), opcode(1), body...]`. No CRC; the
//! opcode-derived total length is authoritative.

use bytes::Bytes;

use super::{Envelope, ExtractResult, FrameVariant, peek_copy};
use crate::{opcode::FunctionCode, ring_buffer::RingBuffer};

const HEADER_LEN: usize = 8;

/// Stateless [`FrameVariant`] implementation for MODBUS TCP (MBAP) framing.
pub struct TcpVariant;

impl FrameVariant for TcpVariant {
    fn try_extract(buf: &RingBuffer) -> ExtractResult {
        if buf.available() < HEADER_LEN {
            return ExtractResult::NeedsMore;
        }
        let Some(header) = peek_copy(buf, HEADER_LEN) else {
            return ExtractResult::NeedsMore;
        };
        let opcode_byte = header[7];

        if FunctionCode::is_exception(opcode_byte) {
            return extract(buf, 9, opcode_byte);
        }

        let Some(fc) = FunctionCode::from_u8(opcode_byte) else {
            return ExtractResult::Invalid { advance: 1 };
        };

        match fc {
            FunctionCode::ReadHolding | FunctionCode::ReadInput | FunctionCode::ReadInfo => {
                if buf.available() < HEADER_LEN + 1 {
                    return ExtractResult::NeedsMore;
                }
                let Some(with_count) = peek_copy(buf, HEADER_LEN + 1) else {
                    return ExtractResult::NeedsMore;
                };
                let byte_count = with_count[HEADER_LEN];
                extract(buf, 9 + byte_count as usize, opcode_byte)
            },
            FunctionCode::WriteSingle | FunctionCode::WriteMulti => {
                extract(buf, 12, opcode_byte)
            },
            FunctionCode::Graph | FunctionCode::GraphRes | FunctionCode::HighResGraph => {
                if buf.available() < HEADER_LEN + 2 {
                    return ExtractResult::NeedsMore;
                }
                let Some(with_len) = peek_copy(buf, HEADER_LEN + 2) else {
                    return ExtractResult::NeedsMore;
                };
                let count =
                    (usize::from(with_len[HEADER_LEN]) << 8) | usize::from(with_len[HEADER_LEN + 1]);
                extract(buf, 10 + count, opcode_byte)
            },
        }
    }
}

fn extract(buf: &RingBuffer, total: usize, opcode_byte: u8) -> ExtractResult {
    if buf.available() < total {
        return ExtractResult::NeedsMore;
    }
    let Some(frame) = peek_copy(buf, total) else {
        return ExtractResult::NeedsMore;
    };
    let payload = Bytes::copy_from_slice(&frame[HEADER_LEN..total]);
    ExtractResult::Frame {
        consumed: total,
        envelope: Envelope { opcode: opcode_byte, address: None, payload },
    }
}
