//! Error types for wire framing and codec decoding.
//!
//! Framer desync (CRC mismatch, a lost length byte) is never surfaced to the
//! caller — it is recovered from locally by the framer (see
//! [`crate::frame`]). The errors here are the ones a decoder or ring buffer
//! raises, which the pipeline forwards to the user on the error channel.

use thiserror::Error;

/// Errors raised while decoding a wire record from a frame payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The input was shorter than the record's fixed or declared size.
    #[error("truncated record: needed {needed} bytes, have {have}")]
    Truncated {
        /// Bytes required to complete the decode.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// The decoder consumed fewer or more bytes than the input provided.
    #[error("unexpected length: expected {expected} bytes, input was {actual}")]
    UnexpectedLength {
        /// Length the decoder expects for this record.
        expected: usize,
        /// Length of the slice actually handed to the decoder.
        actual: usize,
    },

    /// A declared count field implies a length that does not match the
    /// frame payload (for example `Graph.count * 4 + 4 != payload.len()`).
    #[error("declared count {count} implies length {implied}, payload is {actual}")]
    CountMismatch {
        /// Count field read from the wire.
        count: usize,
        /// Length implied by that count.
        implied: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// A CSV row failed to parse as an [`crate::codec::event::Event`].
    #[error("csv parse error: {0}")]
    Csv(String),

    /// The ring buffer was asked to store more bytes than its capacity.
    #[error("ring buffer overflow: capacity {capacity}, attempted to add {attempted}")]
    RingBufferOverflow {
        /// Buffer capacity.
        capacity: usize,
        /// Bytes the caller attempted to write.
        attempted: usize,
    },
}

/// Convenience alias used throughout `hantas-proto`.
pub type Result<T> = std::result::Result<T, ProtocolError>;
