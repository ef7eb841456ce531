//! `PendingRequest` (C8): one in-flight wire request, keyed by opcode,
//! address, and a 32-bit FNV-1a fingerprint of its serialized bytes.

use bytes::Bytes;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash, used to fingerprint a request's serialized bytes for
/// de-duplication (spec.md §3).
#[must_use]
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME))
}

/// De-duplication key: `(opcode, address, fingerprint)`. Two requests with
/// the same opcode and address but different bytes (e.g. a write with a new
/// value) are distinct entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// Wire opcode (Modbus function code or vendor command byte).
    pub opcode: u8,
    /// Register address, or 0 for non-register commands.
    pub address: u16,
    /// `fnv1a32` of the serialized packet.
    pub fingerprint: u32,
}

/// One request awaiting transmission or a matching response.
///
/// Lifecycle: built by the pipeline's public API, pushed into the keyed
/// queue; mutated only by the worker tick; removed on response match,
/// exhausted retries, or a pipeline-wide clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest<I> {
    /// Wire opcode this request carries.
    pub command: u8,
    /// Register address (0 for non-register commands).
    pub address: u16,
    /// Immutable serialized bytes to write to the transport.
    pub packet: Bytes,
    /// De-duplication key derived from `command`, `address`, and `packet`.
    pub key: RequestKey,
    /// Retransmissions remaining after a timeout.
    pub retries_left: u8,
    /// Whether this entry has been written to the transport and is awaiting
    /// a response.
    pub activated: bool,
    /// When this entry was last activated, for timeout comparison.
    pub activated_at: Option<I>,
    /// When set, the entry is removed immediately after transmit rather
    /// than waiting for a response.
    pub no_ack: bool,
}

impl<I> PendingRequest<I> {
    /// Builds a request, deriving its key from `command`/`address`/`packet`.
    #[must_use]
    pub fn new(command: u8, address: u16, packet: Bytes, retries_left: u8, no_ack: bool) -> Self {
        let fingerprint = fnv1a32(&packet);
        Self {
            command,
            address,
            packet,
            key: RequestKey { opcode: command, address, fingerprint },
            retries_left,
            activated: false,
            activated_at: None,
            no_ack,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_distinguishes_bodies_with_shared_opcode_and_address() {
        let a = PendingRequest::<()>::new(0x06, 7, Bytes::from_static(&[0, 1]), 3, false);
        let b = PendingRequest::<()>::new(0x06, 7, Bytes::from_static(&[0, 2]), 3, false);
        assert_eq!(a.key.opcode, b.key.opcode);
        assert_eq!(a.key.address, b.key.address);
        assert_ne!(a.key.fingerprint, b.key.fingerprint);
    }

    #[test]
    fn identical_packets_produce_identical_keys() {
        let a = PendingRequest::<()>::new(0x03, 0, Bytes::from_static(&[1, 2, 3]), 3, false);
        let b = PendingRequest::<()>::new(0x03, 0, Bytes::from_static(&[1, 2, 3]), 3, false);
        assert_eq!(a.key, b.key);
    }
}
