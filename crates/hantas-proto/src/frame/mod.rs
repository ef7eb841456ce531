//! Packet reassembly (C4): locate and validate one frame of a transport
//! variant from an asynchronous byte stream.
//!
//! Each variant (`rtu`, `tcp`, `vendor`) is a state-free extraction function
//! over a byte view; [`Framer`] wraps one with the shared idle-timeout
//! resync policy and drives it against a [`crate::ring_buffer::RingBuffer`].

pub mod rtu;
pub mod tcp;
pub mod vendor;

use std::time::Duration;

use bytes::Bytes;

use crate::ring_buffer::RingBuffer;

/// A decoded frame envelope: the opcode byte, the function-specific payload
/// bytes (header/length/CRC already stripped), and whether the opcode byte
/// carried an exception/response marker.
///
/// `address` is always `None` here — wire frames from the device do not
/// carry the originating request's register address. The pipeline's
/// response router fills it in from the matched queue entry before handing
/// the envelope to a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Raw opcode byte as it appeared on the wire (exception bit included
    /// for RTU/TCP; response bit included for vendor serial).
    pub opcode: u8,
    /// Register address this envelope pertains to, if any. Always `None`
    /// when produced by a framer; set by the pipeline after response
    /// routing.
    pub address: Option<u16>,
    /// Function-specific payload bytes.
    pub payload: Bytes,
}

/// Result of a single extraction attempt over the buffered bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractResult {
    /// Not enough bytes buffered yet to decide.
    NeedsMore,
    /// A complete, validated frame was found; `consumed` bytes should be
    /// removed from the ring buffer.
    Frame { consumed: usize, envelope: Envelope },
    /// The buffered bytes cannot start a valid frame (bad CRC, unrecognized
    /// header). `advance` bytes should be dropped so the next invocation
    /// can resynchronize.
    Invalid { advance: usize },
}

/// What a call to [`Framer::accept`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerOutcome {
    /// No complete frame is available yet.
    NeedsMore,
    /// One complete, validated frame.
    Frame(Envelope),
}

/// Tuning knobs for a [`Framer`].
#[derive(Debug, Clone, Copy)]
pub struct FramerConfig {
    /// How long a non-empty buffer may make no framing progress before it
    /// is cleared to recover from a lost length/CRC byte.
    pub process_timeout: Duration,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self { process_timeout: Duration::from_millis(500) }
    }
}

/// Per-variant extraction entry point. Implemented by the `rtu`, `tcp`, and
/// `vendor` modules as a plain function wrapped in this trait so [`Framer`]
/// can be generic over the variant without dynamic dispatch.
pub trait FrameVariant {
    fn try_extract(buf: &RingBuffer) -> ExtractResult;
}

/// Drives one [`FrameVariant`] against a ring buffer, adding the
/// idle-timeout resync policy shared by every transport.
///
/// Generic over an instant type `I` so tests can drive it with a virtual
/// clock instead of [`std::time::Instant`].
pub struct Framer<V, I> {
    config: FramerConfig,
    last_progress: Option<I>,
    _variant: std::marker::PhantomData<V>,
}

impl<V, I> Framer<V, I>
where
    V: FrameVariant,
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Creates a framer with the given configuration.
    #[must_use]
    pub fn new(config: FramerConfig) -> Self {
        Self { config, last_progress: None, _variant: std::marker::PhantomData }
    }

    /// Attempts one extraction, applying idle-timeout resync around it.
    ///
    /// Emits at most one frame per call, matching the "one envelope or
    /// `NeedsMore`" contract: callers that want every buffered frame drained
    /// should call this in a loop until it returns `NeedsMore`.
    pub fn accept(&mut self, buf: &mut RingBuffer, now: I) -> FramerOutcome {
        if buf.available() == 0 {
            self.last_progress = None;
            return FramerOutcome::NeedsMore;
        }

        match V::try_extract(buf) {
            ExtractResult::Frame { consumed, envelope } => {
                buf.remove(consumed);
                self.last_progress = Some(now);
                FramerOutcome::Frame(envelope)
            },
            ExtractResult::Invalid { advance } => {
                buf.remove(advance.max(1));
                self.last_progress = Some(now);
                tracing::debug!(advance, "framer dropped bytes to resynchronize");
                FramerOutcome::NeedsMore
            },
            ExtractResult::NeedsMore => {
                match self.last_progress {
                    None => self.last_progress = Some(now),
                    Some(since) if now - since > self.config.process_timeout => {
                        tracing::warn!(
                            buffered = buf.available(),
                            "framer idle timeout exceeded, clearing buffer to resync"
                        );
                        buf.clear();
                        self.last_progress = None;
                    },
                    Some(_) => {},
                }
                FramerOutcome::NeedsMore
            },
        }
    }
}

/// Copies `len` logical bytes out of `buf` without consuming them.
/// `None` if fewer than `len` bytes are buffered.
pub(crate) fn peek_copy(buf: &RingBuffer, len: usize) -> Option<Vec<u8>> {
    buf.peek_copy(len)
}
