//! `Graph` record: a time series of torque or angle samples.

use crate::{
    error::{ProtocolError, Result},
    reader::ByteReader,
};

/// Maximum sample count a [`Graph`] may declare.
pub const MAX_GRAPH_SAMPLES: u16 = 2000;

/// Which physical quantity a graph's samples represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphChannel {
    /// Torque samples.
    #[default]
    Torque,
    /// Angle samples.
    Angle,
}

impl GraphChannel {
    /// Range-checks a raw wire value; unknown values leave the field at
    /// [`GraphChannel::default`].
    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Torque),
            1 => Some(Self::Angle),
            _ => None,
        }
    }
}

/// A captured torque/angle time series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Graph {
    /// Which quantity the samples represent.
    pub channel: GraphChannel,
    /// Sample values, big-endian `f32` on the wire.
    pub values: Vec<f32>,
}

impl Graph {
    /// Wire header: `channel(1) + reserved(1) + count(2, BE)`.
    const HEADER_LEN: usize = 4;

    /// Decodes a [`Graph`] from `[channel, reserved, count_hi, count_lo,
    /// sample...]`.
    ///
    /// # Errors
    /// - [`ProtocolError::Truncated`] if fewer than 4 bytes are present.
    /// - [`ProtocolError::CountMismatch`] if `4 + count * 4 != bytes.len()`
    ///   (invariant 3), or if `count` exceeds [`MAX_GRAPH_SAMPLES`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        let channel_raw = r.read_u8()?;
        r.skip(1)?; // reserved
        let count = r.read_u16()?;

        let implied = Self::HEADER_LEN + usize::from(count) * 4;
        if implied != bytes.len() || count > MAX_GRAPH_SAMPLES {
            return Err(ProtocolError::CountMismatch {
                count: usize::from(count),
                implied,
                actual: bytes.len(),
            });
        }

        let mut values = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            values.push(r.read_f32()?);
        }

        Ok(Self { channel: GraphChannel::from_u8(channel_raw).unwrap_or_default(), values })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode(channel: u8, count: u16, values: &[f32]) -> Vec<u8> {
        let mut bytes = vec![channel, 0u8];
        bytes.extend_from_slice(&count.to_be_bytes());
        for v in values {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn s5_graph_validation_accepts_matching_count() {
        let bytes = encode(0, 4, &[1.0, 2.0, 3.0, 4.0]);
        let graph = Graph::from_bytes(&bytes).unwrap();
        assert_eq!(graph.values.len(), 4);
        assert_eq!(graph.channel, GraphChannel::Torque);
    }

    #[test]
    fn s5_graph_validation_rejects_mismatched_count() {
        let mut bytes = encode(0, 4, &[1.0, 2.0, 3.0, 4.0]);
        bytes[2..4].copy_from_slice(&5u16.to_be_bytes()); // claim 5, only 4 present
        assert!(matches!(Graph::from_bytes(&bytes), Err(ProtocolError::CountMismatch { .. })));
    }

    #[test]
    fn oversized_count_is_rejected_even_if_consistent() {
        let count = MAX_GRAPH_SAMPLES + 1;
        let values = vec![0.0f32; count as usize];
        let bytes = encode(1, count, &values);
        assert!(matches!(Graph::from_bytes(&bytes), Err(ProtocolError::CountMismatch { .. })));
    }

    #[test]
    fn unknown_channel_defaults_without_erroring() {
        let bytes = encode(0xFF, 0, &[]);
        let graph = Graph::from_bytes(&bytes).unwrap();
        assert_eq!(graph.channel, GraphChannel::Torque);
    }
}
