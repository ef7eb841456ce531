//! Serial RTU transport (C7): opens a named serial port at a permitted baud
//! rate, fixed 8N1, iso-8859-1 byte transparency (spec.md §4.7).

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::{
    error::TransportError,
    transport::{Transport, clamp_device_id, validate_baud_rate},
};

/// Configuration for a [`RtuTransport`].
#[derive(Debug, Clone)]
pub struct RtuConfig {
    /// OS-level serial port name (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port_name: String,
    /// Baud rate; must be one of [`crate::transport::PERMITTED_BAUD_RATES`].
    pub baud_rate: u32,
    /// Modbus device id, clamped to `0..=0x0F` at construction.
    pub device_id: u8,
}

impl RtuConfig {
    /// Creates a config, clamping `device_id` into range. Does not validate
    /// `baud_rate`; that happens at [`RtuTransport::open`] so the error
    /// carries the context of an actual open attempt.
    #[must_use]
    pub fn new(port_name: impl Into<String>, baud_rate: u32, device_id: u8) -> Self {
        Self { port_name: port_name.into(), baud_rate, device_id: clamp_device_id(device_id) }
    }
}

/// Opens a fixed 8N1 serial port for RTU or vendor-serial framing, shared by
/// [`RtuTransport`] and `hantas_transport::vendor::VendorSerialTransport`.
pub(crate) fn open_8n1(config: &RtuConfig) -> Result<SerialStream, TransportError> {
    validate_baud_rate(config.baud_rate)?;
    tokio_serial::new(&config.port_name, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .open_native_async()
        .map_err(|err| TransportError::Open(format!("{}: {err}", config.port_name)))
}

/// MODBUS RTU transport over a serial port.
pub struct RtuTransport {
    config: RtuConfig,
    stream: Option<SerialStream>,
}

impl RtuTransport {
    /// Creates a not-yet-open transport for `config`.
    #[must_use]
    pub fn new(config: RtuConfig) -> Self {
        Self { config, stream: None }
    }
}

#[async_trait]
impl Transport for RtuTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let stream = open_8n1(&self.config)?;
        tracing::info!(port = %self.config.port_name, baud = self.config.baud_rate, "rtu transport opened");
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.stream.take().is_some() {
            tracing::info!(port = %self.config.port_name, "rtu transport closed");
        }
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream.write_all(bytes).await.map_err(|err| TransportError::Write(err.to_string()))
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let n = stream.read(buf).await.map_err(|err| TransportError::Read(err.to_string()))?;
        if n == 0 {
            return Err(TransportError::PeerClosed);
        }
        Ok(n)
    }

    fn device_id(&self) -> u8 {
        self.config.device_id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_id_is_clamped_at_construction() {
        let config = RtuConfig::new("/dev/ttyUSB0", 9600, 0xFF);
        assert_eq!(config.device_id, 0x0F);
    }

    #[tokio::test]
    async fn send_before_open_fails_with_not_open() {
        let mut transport = RtuTransport::new(RtuConfig::new("/dev/ttyUSB0", 9600, 1));
        let err = transport.send(&[0x01]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotOpen));
    }

    #[tokio::test]
    async fn open_rejects_unsupported_baud_rate() {
        let mut transport = RtuTransport::new(RtuConfig::new("/dev/ttyUSB0", 4800, 1));
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfig(_)));
    }
}
