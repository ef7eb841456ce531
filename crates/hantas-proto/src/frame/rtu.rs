//! MODBUS RTU framer variant.
//!
//! `[id(1), opcode(1), body..., crc_lo(1), crc_hi(1)]`. Length is derived
//! from the opcode and, for most responses, a byte-count field immediately
//! following it.

use bytes::Bytes;

use super::{Envelope, ExtractResult, FrameVariant, peek_copy};
use crate::{crc::crc16_verify, opcode::FunctionCode, ring_buffer::RingBuffer};

/// Exception frames are always `[id, opcode|0x80, code, crc_lo, crc_hi]`.
const EXCEPTION_FRAME_LEN: usize = 5;

/// Stateless [`FrameVariant`] implementation for MODBUS RTU framing.
pub struct RtuVariant;

impl FrameVariant for RtuVariant {
    fn try_extract(buf: &RingBuffer) -> ExtractResult {
        if buf.available() < 3 {
            return ExtractResult::NeedsMore;
        }
        let Some(head) = peek_copy(buf, 3) else {
            return ExtractResult::NeedsMore;
        };
        let opcode_byte = head[1];
        let byte0 = head[2];

        if FunctionCode::is_exception(opcode_byte) {
            return extract_crc_checked(buf, EXCEPTION_FRAME_LEN, opcode_byte, 2);
        }

        let Some(fc) = FunctionCode::from_u8(opcode_byte) else {
            // Unknown opcode: cannot determine a length, drop one byte and
            // let the next call retry from the following position.
            return ExtractResult::Invalid { advance: 1 };
        };

        match fc {
            FunctionCode::ReadHolding | FunctionCode::ReadInput | FunctionCode::ReadInfo => {
                let total = 3 + byte0 as usize + 2;
                extract_crc_checked(buf, total, opcode_byte, 2)
            },
            FunctionCode::WriteSingle | FunctionCode::WriteMulti => {
                extract_crc_checked(buf, 8, opcode_byte, 2)
            },
            FunctionCode::Graph | FunctionCode::GraphRes | FunctionCode::HighResGraph => {
                if buf.available() < 4 {
                    return ExtractResult::NeedsMore;
                }
                let Some(header4) = peek_copy(buf, 4) else {
                    return ExtractResult::NeedsMore;
                };
                let count = (usize::from(byte0) << 8) | usize::from(header4[3]);
                let total = 4 + count + 2;
                extract_crc_checked(buf, total, opcode_byte, 3)
            },
        }
    }
}

/// Extracts a frame of `total` bytes, verifying the trailing CRC pair over
/// everything before it, and splitting the payload after `header_len`
/// bytes (id + opcode + any length-prefix bytes).
fn extract_crc_checked(
    buf: &RingBuffer,
    total: usize,
    opcode_byte: u8,
    header_len: usize,
) -> ExtractResult {
    if buf.available() < total {
        return ExtractResult::NeedsMore;
    }
    let Some(frame) = peek_copy(buf, total) else {
        return ExtractResult::NeedsMore;
    };
    let crc_region = &frame[..total - 2];
    let (lo, hi) = (frame[total - 2], frame[total - 1]);
    if !crc16_verify(crc_region, lo, hi) {
        return ExtractResult::Invalid { advance: 1 };
    }
    let payload = Bytes::copy_from_slice(&frame[header_len..total - 2]);
    ExtractResult::Frame {
        consumed: total,
        envelope: Envelope { opcode: opcode_byte, address: None, payload },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::crc::crc16_bytes;

    fn push(buf: &mut RingBuffer, bytes: &[u8]) {
        buf.write(bytes).unwrap();
    }

    #[test]
    fn write_single_request_frame_is_extracted() {
        // Requests and responses share one byte stream; the length rule for
        // read-holding/read-input/read-info keys off a response's byte-count
        // byte, so this variant only decodes the device's responses to those
        // reads. Write-single's fixed 8-byte shape decodes identically for
        // the request and its echo response, so it is used here to exercise
        // the general extract-and-verify-CRC path end to end.
        // [01 06 00 00 00 01] + crc
        let body = [0x01, 0x06, 0x00, 0x00, 0x00, 0x01];
        let (lo, hi) = crc16_bytes(&body);
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &body);
        push(&mut buf, &[lo, hi]);

        match RtuVariant::try_extract(&buf) {
            ExtractResult::Frame { consumed, envelope } => {
                assert_eq!(consumed, 8);
                assert_eq!(envelope.opcode, 0x06);
            },
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn read_holding_response_uses_byte_count_for_length() {
        // id=1, fc=3, byteCount=20, 20 data bytes, crc
        let mut body = vec![0x01, 0x03, 20u8];
        body.extend(std::iter::repeat(0xAB).take(20));
        let (lo, hi) = crc16_bytes(&body);
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &body);
        push(&mut buf, &[lo, hi]);

        match RtuVariant::try_extract(&buf) {
            ExtractResult::Frame { consumed, envelope } => {
                assert_eq!(consumed, 3 + 20 + 2);
                assert_eq!(envelope.payload.len(), 21); // byteCount + 20 data bytes
            },
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn crc_mismatch_reports_invalid_without_consuming_the_frame() {
        let body = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &body);
        push(&mut buf, &[0x00, 0x00]); // deliberately wrong CRC

        assert_eq!(RtuVariant::try_extract(&buf), ExtractResult::Invalid { advance: 1 });
    }

    #[test]
    fn exception_frame_is_five_bytes() {
        let body = [0x01, 0x83, 0x02]; // illegal data address
        let (lo, hi) = crc16_bytes(&body);
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &body);
        push(&mut buf, &[lo, hi]);

        match RtuVariant::try_extract(&buf) {
            ExtractResult::Frame { consumed, envelope } => {
                assert_eq!(consumed, 5);
                assert_eq!(envelope.opcode, 0x83);
                assert_eq!(&envelope.payload[..], &[0x02]);
            },
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn partial_frame_requests_more_bytes() {
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &[0x01, 0x03]);
        assert_eq!(RtuVariant::try_extract(&buf), ExtractResult::NeedsMore);
    }
}
