//! Vendor framed-serial framer variant.
//!
//! `[0x5A, 0xA5, len_lo, len_hi, command(1), payload(len-1)]`. `len` is
//! little-endian, the only multi-byte little-endian field in the protocol.
//! No CRC; out-of-sync bytes are scanned for the two-byte header literal.

use bytes::Bytes;

use super::{Envelope, ExtractResult, FrameVariant, peek_copy};
use crate::ring_buffer::RingBuffer;

const HEADER: [u8; 2] = [0x5A, 0xA5];

/// Stateless [`FrameVariant`] implementation for vendor framed-serial framing.
pub struct VendorVariant;

impl FrameVariant for VendorVariant {
    fn try_extract(buf: &RingBuffer) -> ExtractResult {
        if buf.available() < 2 {
            return ExtractResult::NeedsMore;
        }
        let Some(probe) = peek_copy(buf, 2) else {
            return ExtractResult::NeedsMore;
        };
        if probe != HEADER {
            let Some(all) = peek_copy(buf, buf.available()) else {
                return ExtractResult::NeedsMore;
            };
            return match find_header(&all) {
                Some(pos) => ExtractResult::Invalid { advance: pos },
                None => ExtractResult::Invalid { advance: all.len().saturating_sub(1) },
            };
        }

        if buf.available() < 4 {
            return ExtractResult::NeedsMore;
        }
        let Some(header4) = peek_copy(buf, 4) else {
            return ExtractResult::NeedsMore;
        };
        let len = u16::from_le_bytes([header4[2], header4[3]]) as usize;
        if len == 0 {
            // No command byte possible; drop the malformed header.
            return ExtractResult::Invalid { advance: 4 };
        }

        let total = 4 + len;
        if buf.available() < total {
            return ExtractResult::NeedsMore;
        }
        let Some(frame) = peek_copy(buf, total) else {
            return ExtractResult::NeedsMore;
        };
        let opcode_byte = frame[4];
        let payload = Bytes::copy_from_slice(&frame[5..total]);
        ExtractResult::Frame {
            consumed: total,
            envelope: Envelope { opcode: opcode_byte, address: None, payload },
        }
    }
}

fn find_header(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == HEADER)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn push(buf: &mut RingBuffer, bytes: &[u8]) {
        buf.write(bytes).unwrap();
    }

    #[test]
    fn req_torque_frame_is_extracted() {
        // command 0x05, payload "12.3,Nm" (7 bytes) -> len = 1 + 7 = 8
        let payload = b"12.3,Nm";
        let mut frame = vec![0x5A, 0xA5, 8u8, 0x00, 0x05];
        frame.extend_from_slice(payload);
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &frame);

        match VendorVariant::try_extract(&buf) {
            ExtractResult::Frame { consumed, envelope } => {
                assert_eq!(consumed, frame.len());
                assert_eq!(envelope.opcode, 0x05);
                assert_eq!(&envelope.payload[..], payload);
            },
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn garbage_prefix_is_scanned_past() {
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &[0x00, 0x11, 0x22, 0x5A, 0xA5]);
        assert_eq!(VendorVariant::try_extract(&buf), ExtractResult::Invalid { advance: 3 });
    }

    #[test]
    fn no_header_anywhere_trims_to_final_byte() {
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &[0x00, 0x11, 0x22, 0x33]);
        assert_eq!(VendorVariant::try_extract(&buf), ExtractResult::Invalid { advance: 3 });
    }

    #[test]
    fn partial_header_requests_more() {
        let mut buf = RingBuffer::new(64);
        push(&mut buf, &[0x5A, 0xA5, 0x08]);
        assert_eq!(VendorVariant::try_extract(&buf), ExtractResult::NeedsMore);
    }
}
