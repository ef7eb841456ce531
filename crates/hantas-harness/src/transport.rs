//! [`InMemoryTransport`]: an in-process duplex [`Transport`] pair, so
//! scenario tests can drive a pipeline against a hand-written "device" loop
//! without a real serial port or socket.

use async_trait::async_trait;
use hantas_transport::{Transport, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Builds a connected pair: `(client, device)`. Bytes sent on one arrive on
/// the other. `buffer` is the duplex channel's internal capacity in bytes.
#[must_use]
pub fn in_memory_pair(buffer: usize, device_id: u8) -> (InMemoryTransport, InMemoryTransport) {
    let (a, b) = tokio::io::duplex(buffer);
    (InMemoryTransport::new(a, device_id), InMemoryTransport::new(b, device_id))
}

/// One end of an in-memory duplex pair, implementing [`Transport`].
///
/// `open`/`close` do not create or tear down the underlying channel (the
/// pair is already connected at construction); they only gate `send`/`recv`
/// the same way a real adapter's `NotOpen` check does.
pub struct InMemoryTransport {
    stream: Option<DuplexStream>,
    device_id: u8,
}

impl InMemoryTransport {
    fn new(stream: DuplexStream, device_id: u8) -> Self {
        Self { stream: Some(stream), device_id }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_none() {
            return Err(TransportError::Open("in-memory transport has already been closed".into()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream = None;
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
        self.device_id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_written_on_one_end_arrive_on_the_other() {
        let (mut client, mut device) = in_memory_pair(256, 1);
        client.send(&[0x01, 0x03, 0x00, 0x00]).await.unwrap();
        let mut buf = [0u8; 16];
        let n = device.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x01, 0x03, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn send_after_close_fails_with_not_open() {
        let (mut client, _device) = in_memory_pair(256, 1);
        client.close().await.unwrap();
        let err = client.send(&[0x01]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotOpen));
    }

    #[tokio::test]
    async fn closing_one_end_surfaces_as_peer_closed_on_the_other() {
        let (mut client, mut device) = in_memory_pair(256, 1);
        drop(client);
        let mut buf = [0u8; 16];
        let err = device.recv(&mut buf).await.unwrap_err();
        assert!(matches!(err, TransportError::PeerClosed));
    }
}
