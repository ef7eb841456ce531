//! Outgoing wire-frame builders, the mirror image of [`crate::frame`].
//!
//! The framer only ever decodes bytes arriving *from* the device
//! (responses); the host's own outgoing requests are built here, once per
//! transport variant, by the request pipeline. Keeping both sides of the
//! wire format in this crate means a single place knows the exact byte
//! layout for each variant.

use crate::{
    crc::crc16_bytes,
    opcode::{FunctionCode, VendorCommand},
};

/// Builds an RTU request frame for a register read
/// (`ReadHolding`/`ReadInput`/`ReadInfo`): `[id, fc, addr(2), count(2),
/// crc(2)]`.
#[must_use]
pub fn rtu_read(device_id: u8, function: FunctionCode, address: u16, count: u16) -> Vec<u8> {
    let mut body = vec![device_id, function.to_u8()];
    body.extend_from_slice(&address.to_be_bytes());
    body.extend_from_slice(&count.to_be_bytes());
    append_crc(body)
}

/// Builds an RTU `WriteSingle` request frame: `[id, fc, addr(2), value(2),
/// crc(2)]`.
#[must_use]
pub fn rtu_write_single(device_id: u8, address: u16, value: u16) -> Vec<u8> {
    let mut body = vec![device_id, FunctionCode::WriteSingle.to_u8()];
    body.extend_from_slice(&address.to_be_bytes());
    body.extend_from_slice(&value.to_be_bytes());
    append_crc(body)
}

/// Builds an RTU `WriteMulti` request frame: `[id, fc, addr(2), count(2),
/// byte_count(1), values(2*count), crc(2)]`.
#[must_use]
pub fn rtu_write_multi(device_id: u8, address: u16, values: &[u16]) -> Vec<u8> {
    let mut body = vec![device_id, FunctionCode::WriteMulti.to_u8()];
    body.extend_from_slice(&address.to_be_bytes());
    body.extend_from_slice(&(values.len() as u16).to_be_bytes());
    body.push((values.len() * 2) as u8);
    for value in values {
        body.extend_from_slice(&value.to_be_bytes());
    }
    append_crc(body)
}

fn append_crc(mut body: Vec<u8>) -> Vec<u8> {
    let (lo, hi) = crc16_bytes(&body);
    body.push(lo);
    body.push(hi);
    body
}

/// MBAP header length, shared by every TCP request builder below.
const MBAP_LEN: usize = 7;

fn mbap(transaction_id: u16, device_id: u8, function: FunctionCode, pdu_len: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MBAP_LEN + 1 + pdu_len);
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes()); // protocol id, always zero
    frame.extend_from_slice(&((pdu_len + 2) as u16).to_be_bytes()); // uid + fc + pdu
    frame.push(device_id);
    frame.push(function.to_u8());
    frame
}

/// Builds a TCP (MBAP) request frame for a register read.
#[must_use]
pub fn tcp_read(
    transaction_id: u16,
    device_id: u8,
    function: FunctionCode,
    address: u16,
    count: u16,
) -> Vec<u8> {
    let mut frame = mbap(transaction_id, device_id, function, 4);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    frame
}

/// Builds a TCP (MBAP) `WriteSingle` request frame.
#[must_use]
pub fn tcp_write_single(transaction_id: u16, device_id: u8, address: u16, value: u16) -> Vec<u8> {
    let mut frame = mbap(transaction_id, device_id, FunctionCode::WriteSingle, 4);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&value.to_be_bytes());
    frame
}

/// Builds a TCP (MBAP) `WriteMulti` request frame.
#[must_use]
pub fn tcp_write_multi(transaction_id: u16, device_id: u8, address: u16, values: &[u16]) -> Vec<u8> {
    let pdu_len = 5 + values.len() * 2;
    let mut frame = mbap(transaction_id, device_id, FunctionCode::WriteMulti, pdu_len);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&(values.len() as u16).to_be_bytes());
    frame.push((values.len() * 2) as u8);
    for value in values {
        frame.extend_from_slice(&value.to_be_bytes());
    }
    frame
}

/// Builds a vendor framed-serial request: `[0x5A, 0xA5, len_lo, len_hi,
/// command, payload...]`. `len` (little-endian) covers the command byte
/// plus `payload`.
#[must_use]
pub fn vendor_frame(command: VendorCommand, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 1) as u16;
    let mut frame = vec![0x5A, 0xA5];
    frame.extend_from_slice(&len.to_le_bytes());
    frame.push(command.to_u8());
    frame.extend_from_slice(payload);
    frame
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{crc::crc16_verify, frame::rtu::RtuVariant, ring_buffer::RingBuffer};

    #[test]
    fn s1_tcp_read_holding_matches_scenario_bytes() {
        let frame = tcp_read(1, 1, FunctionCode::ReadHolding, 0, 10);
        assert_eq!(frame, vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn rtu_read_request_round_trips_through_the_framer() {
        // Built requests are valid, CRC-verified frames; only a reader that
        // mistakes the address's high byte for a response byte-count (see
        // hantas-proto::frame::rtu) would misparse them.
        let frame = rtu_read(1, FunctionCode::ReadHolding, 0, 10);
        let (lo, hi) = crc16_bytes(&frame[..frame.len() - 2]);
        assert!(crc16_verify(&frame[..frame.len() - 2], lo, hi));
    }

    #[test]
    fn rtu_write_single_round_trips_through_the_framer() {
        let frame = rtu_write_single(3, 7, 42);
        let mut buf = RingBuffer::new(64);
        buf.write(&frame).unwrap();
        match <RtuVariant as crate::frame::FrameVariant>::try_extract(&buf) {
            crate::frame::ExtractResult::Frame { consumed, envelope } => {
                assert_eq!(consumed, frame.len());
                assert_eq!(envelope.opcode, FunctionCode::WriteSingle.to_u8());
            },
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn vendor_frame_length_covers_command_and_payload() {
        let frame = vendor_frame(VendorCommand::ReqTorque, b"12.3,Nm");
        assert_eq!(&frame[0..2], &[0x5A, 0xA5]);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 8);
        assert_eq!(frame[4], VendorCommand::ReqTorque.to_u8());
    }
}
