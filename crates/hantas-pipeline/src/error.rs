//! Pipeline-level error taxonomy (spec.md §7): wraps the errors raised by
//! every layer underneath plus the pipeline's own decode/routing failures.

use thiserror::Error;

/// Errors a [`crate::pipeline::Pipeline`] can surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A wire codec rejected its input (size, count, or CSV parse failure).
    #[error(transparent)]
    Protocol(#[from] hantas_proto::ProtocolError),

    /// The connection state machine rejected an operation for the current
    /// state (e.g. `connect()` while already connecting).
    #[error(transparent)]
    Connection(#[from] hantas_core::ConnectionError),

    /// The keyed queue backing in-flight requests is disposed or the
    /// key-selector failed.
    #[error(transparent)]
    Queue(#[from] hantas_core::QueueError),

    /// The transport failed to open, write, or read.
    #[error(transparent)]
    Transport(#[from] hantas_transport::TransportError),

    /// A frame arrived with an opcode this wire variant does not recognize.
    #[error("unrecognized opcode {opcode:#04x} on {wire} wire")]
    UnknownOpcode {
        /// Raw opcode byte as it appeared on the wire.
        opcode: u8,
        /// Wire variant the opcode arrived on, for diagnostics.
        wire: &'static str,
    },

    /// A vendor torque-stream line did not parse as `value,unit`.
    #[error("malformed vendor torque line: {0}")]
    MalformedTorqueLine(String),

    /// The worker task was not reachable (already closed, or panicked).
    #[error("pipeline worker is no longer running")]
    WorkerUnavailable,
}

/// Error channel categories (spec.md §7): transport, decode, or pipeline
/// bookkeeping failures (queue-full, retries exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open/write/read failure, or a peer-initiated close.
    Transport,
    /// A decoded record failed its size or range invariants.
    Decode,
    /// Pipeline bookkeeping: retries exhausted, duplicate enqueue refused.
    Pipeline,
}
