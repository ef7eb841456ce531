//! Errors surfaced by transport adapters.

use thiserror::Error;

/// Errors raised opening, writing to, or reading from a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Opening the underlying serial port or socket failed.
    #[error("failed to open transport: {0}")]
    Open(String),

    /// A configuration value (baud rate, device id, address) was rejected
    /// before an open attempt was even made.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// Writing bytes to an open transport failed.
    #[error("failed to write to transport: {0}")]
    Write(String),

    /// Reading from an open transport failed for a reason other than a
    /// graceful peer close.
    #[error("failed to read from transport: {0}")]
    Read(String),

    /// The peer closed the connection (TCP FIN, or the serial device
    /// disappearing).
    #[error("peer closed the connection")]
    PeerClosed,

    /// An operation was attempted on a transport that is not open.
    #[error("transport is not open")]
    NotOpen,
}
