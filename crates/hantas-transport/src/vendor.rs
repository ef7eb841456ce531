//! Vendor framed-serial transport (C7): the same physical serial layer as
//! [`crate::rtu::RtuTransport`], carrying a different frame shape on top
//! (`hantas_proto::frame::vendor`). Sharing `open_8n1` keeps the two
//! variants' baud/parity/device-id handling from drifting apart.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialStream;

use crate::{
    error::TransportError,
    rtu::{RtuConfig, open_8n1},
    transport::Transport,
};

/// Vendor framed-serial transport. Configuration is identical to
/// [`RtuConfig`]; only the framer layered on top by `hantas-pipeline`
/// differs.
pub struct VendorSerialTransport {
    config: RtuConfig,
    stream: Option<SerialStream>,
}

impl VendorSerialTransport {
    /// Creates a not-yet-open transport for `config`.
    #[must_use]
    pub fn new(config: RtuConfig) -> Self {
        Self { config, stream: None }
    }
}

#[async_trait]
impl Transport for VendorSerialTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let stream = open_8n1(&self.config)?;
        tracing::info!(port = %self.config.port_name, baud = self.config.baud_rate, "vendor serial transport opened");
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.stream.take().is_some() {
            tracing::info!(port = %self.config.port_name, "vendor serial transport closed");
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
