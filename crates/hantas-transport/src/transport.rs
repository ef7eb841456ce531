//! The `Transport` capability trait (C7): open/close/send/receive, shared
//! by every concrete adapter in this crate.
//!
//! Modeled as a narrow capability set rather than an inheritance hierarchy
//! (spec.md §9): the pipeline only ever needs these five operations, never
//! the concrete serial or socket type underneath.

use async_trait::async_trait;

use crate::error::TransportError;

/// Bytes-in, bytes-out capability a device-communication transport must
/// provide. The framer, not this trait, is responsible for finding frame
/// boundaries in whatever `recv` hands back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the underlying serial port or socket. Idempotent only in the
    /// sense that calling it while already open is an error, not a no-op —
    /// callers drive `open`/`close` explicitly through [`hantas_core::Connection`].
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Closes the transport. Safe to call on an already-closed transport.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Writes `bytes` in full. Exposed to the caller as an observable event
    /// (`on_tx_raw`) by the pipeline, not by this trait.
    async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Reads whatever bytes are currently available into `buf`, returning
    /// the number read. Returns `Ok(0)` only on a graceful peer close;
    /// transient "nothing available yet" is modeled by the future simply not
    /// resolving, not by a zero-length `Ok`.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// The device id this transport was opened for, clamped to the variant's
    /// valid range at construction time.
    fn device_id(&self) -> u8;
}

/// Permitted RTU / vendor-serial baud rates (spec.md §4.7).
pub const PERMITTED_BAUD_RATES: [u32; 6] = [9600, 19200, 38400, 57600, 115200, 230400];

/// Clamps a requested device id into the protocol's valid range.
#[must_use]
pub fn clamp_device_id(id: u8) -> u8 {
    id.min(0x0F)
}

/// Validates a baud rate against the permitted set.
///
/// # Errors
///
/// Returns [`TransportError::InvalidConfig`] if `baud` is not one of
/// [`PERMITTED_BAUD_RATES`].
pub fn validate_baud_rate(baud: u32) -> Result<(), TransportError> {
    if PERMITTED_BAUD_RATES.contains(&baud) {
        Ok(())
    } else {
        Err(TransportError::InvalidConfig(format!(
            "unsupported baud rate {baud}; permitted: {PERMITTED_BAUD_RATES:?}"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_id_is_clamped_to_four_bits() {
        assert_eq!(clamp_device_id(0x00), 0x00);
        assert_eq!(clamp_device_id(0x0F), 0x0F);
        assert_eq!(clamp_device_id(0x10), 0x0F);
        assert_eq!(clamp_device_id(0xFF), 0x0F);
    }

    #[test]
    fn baud_rate_validation_accepts_only_the_permitted_set() {
        for baud in PERMITTED_BAUD_RATES {
            assert!(validate_baud_rate(baud).is_ok());
        }
        assert!(validate_baud_rate(4800).is_err());
        assert!(validate_baud_rate(1_000_000).is_err());
    }
}
