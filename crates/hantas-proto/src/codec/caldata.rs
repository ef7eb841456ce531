//! `CalData` record: per-point calibration data, width depending on the
//! sensor's body type.

use crate::{
    error::{ProtocolError, Result},
    reader::ByteReader,
};

/// Hardware layout flag. Separated bodies carry wider offset/calibration
/// fields (32-bit instead of 16-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    /// Sensor and driver share one housing; 16-bit calibration fields.
    #[default]
    Integrated,
    /// Sensor and driver are separate units; 32-bit calibration fields.
    Separated,
}

impl BodyType {
    /// Range-checks a raw wire value; unknown values leave the field at
    /// [`BodyType::default`].
    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Integrated),
            1 => Some(Self::Separated),
            _ => None,
        }
    }
}

const CAL_POINTS: usize = 5;

/// Decoded calibration data for one reference point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalData {
    /// Hardware body layout.
    pub body_type: BodyType,
    /// Driver model identifier.
    pub model_id: u16,
    /// Maximum rated torque.
    pub max_torque: u32,
    /// Sensor body serial number.
    pub body_serial: u32,
    /// Sensor element serial number.
    pub sensor_serial: u32,
    /// Torque unit tag.
    pub unit: u8,
    /// Calibration point index.
    pub point_index: u8,
    /// ADC offset at this point.
    pub offset: u32,
    /// Positive-direction calibration words (5 points).
    pub positive: [u32; CAL_POINTS],
    /// Negative-direction calibration words (5 points).
    pub negative: [u32; CAL_POINTS],
    /// Firmware trailer: (major, minor, micro).
    pub firmware: (u8, u8, u8),
}

impl CalData {
    /// Decodes a [`CalData`] record. Field widths (16- vs 32-bit) for
    /// `offset`/`positive`/`negative` depend on the body type byte, which
    /// is always the first byte on the wire.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedLength`] if `bytes.len()` does not match
    /// the length implied by the decoded body type.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        let body_type_raw = r.read_u8()?;
        let body_type = BodyType::from_u8(body_type_raw).unwrap_or_default();
        let model_id = r.read_u16()?;
        let max_torque = r.read_u32()?;
        let body_serial = r.read_u32()?;
        let sensor_serial = r.read_u32()?;
        let unit = r.read_u8()?;
        let point_index = r.read_u8()?;

        let (offset, positive, negative) = match body_type {
            BodyType::Integrated => {
                let offset = u32::from(r.read_u16()?);
                let mut positive = [0u32; CAL_POINTS];
                let mut negative = [0u32; CAL_POINTS];
                for slot in &mut positive {
                    *slot = u32::from(r.read_u16()?);
                }
                for slot in &mut negative {
                    *slot = u32::from(r.read_u16()?);
                }
                (offset, positive, negative)
            },
            BodyType::Separated => {
                let offset = r.read_u32()?;
                let mut positive = [0u32; CAL_POINTS];
                let mut negative = [0u32; CAL_POINTS];
                for slot in &mut positive {
                    *slot = r.read_u32()?;
                }
                for slot in &mut negative {
                    *slot = r.read_u32()?;
                }
                (offset, positive, negative)
            },
        };

        let firmware = (r.read_u8()?, r.read_u8()?, r.read_u8()?);

        if r.position() != bytes.len() {
            return Err(ProtocolError::UnexpectedLength { expected: r.position(), actual: bytes.len() });
        }

        Ok(Self {
            body_type,
            model_id,
            max_torque,
            body_serial,
            sensor_serial,
            unit,
            point_index,
            offset,
            positive,
            negative,
            firmware,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fixed_header() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7u16.to_be_bytes()); // model_id
        bytes.extend_from_slice(&500u32.to_be_bytes()); // max_torque
        bytes.extend_from_slice(&1u32.to_be_bytes()); // body_serial
        bytes.extend_from_slice(&2u32.to_be_bytes()); // sensor_serial
        bytes.push(0); // unit
        bytes.push(3); // point_index
        bytes
    }

    #[test]
    fn integrated_body_uses_sixteen_bit_fields() {
        let mut bytes = vec![0u8]; // Integrated
        bytes.extend(fixed_header());
        bytes.extend_from_slice(&10u16.to_be_bytes()); // offset
        for _ in 0..10 {
            bytes.extend_from_slice(&1u16.to_be_bytes());
        }
        bytes.extend_from_slice(&[1, 2, 3]); // firmware

        let cal = CalData::from_bytes(&bytes).unwrap();
        assert_eq!(cal.body_type, BodyType::Integrated);
        assert_eq!(cal.offset, 10);
        assert_eq!(cal.firmware, (1, 2, 3));
    }

    #[test]
    fn separated_body_uses_thirty_two_bit_fields() {
        let mut bytes = vec![1u8]; // Separated
        bytes.extend(fixed_header());
        bytes.extend_from_slice(&10u32.to_be_bytes()); // offset
        for _ in 0..10 {
            bytes.extend_from_slice(&1u32.to_be_bytes());
        }
        bytes.extend_from_slice(&[1, 2, 3]); // firmware

        let cal = CalData::from_bytes(&bytes).unwrap();
        assert_eq!(cal.body_type, BodyType::Separated);
        assert_eq!(cal.offset, 10);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = vec![0u8; 5];
        assert!(CalData::from_bytes(&bytes).is_err());
    }
}
