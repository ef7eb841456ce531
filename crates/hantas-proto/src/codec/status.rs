//! `Status` record: generation-dependent torque tool status snapshot.
//!
//! `StatusGeneration` is selected explicitly by the caller per-connection
//! (it is not sniffed from the wire) — see the DESIGN.md entry for this
//! decoder for the rationale.

use super::Direction;
use crate::{
    error::{ProtocolError, Result},
    reader::ByteReader,
};

/// Protocol revision, selecting [`Status`] and `Event` field widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGeneration {
    /// Oldest wire form: fixed-point torque/temperature, no model/lock bit.
    Gen1,
    /// Same layout as `Gen1`; kept as a distinct tag for tools that branch
    /// on generation elsewhere in the protocol.
    Gen1Plus,
    /// Current wire form: floating-point torque/temperature, carries model
    /// and lock state.
    Gen2,
}

const LEGACY_LEN: usize = 20;
const GEN2_LEN: usize = 25;

/// Decoded tool status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Status {
    /// Current torque reading, in the tool's configured unit.
    pub torque: f32,
    /// Motor speed (RPM or tool-defined unit).
    pub speed: u16,
    /// Motor current.
    pub current: u16,
    /// Active preset index (0..=31, plus 32/33 aliased MA/MB).
    pub preset: u8,
    /// Model identifier; only populated for [`StatusGeneration::Gen2`].
    pub model: Option<u16>,
    /// Torque target reached.
    pub torque_up: bool,
    /// Fastening judged OK.
    pub fasten_ok: bool,
    /// Tool ready to fasten.
    pub ready: bool,
    /// Motor currently running.
    pub run: bool,
    /// Raw alarm code (0 = none).
    pub alarm: u8,
    /// Direction of rotation.
    pub direction: Direction,
    /// Remaining screw count in the active job.
    pub remain_screw: u16,
    /// Digital input bitmap, decomposed to 16 booleans (bit 0 first).
    pub inputs: [bool; 16],
    /// Digital output bitmap, decomposed to 16 booleans (bit 0 first).
    pub outputs: [bool; 16],
    /// Current temperature reading.
    pub temperature: f32,
    /// Spindle lock engaged; only populated for [`StatusGeneration::Gen2`].
    pub is_lock: Option<bool>,
}

fn bitmap16(raw: u16) -> [bool; 16] {
    std::array::from_fn(|i| raw & (1 << i) != 0)
}

impl Status {
    /// Wire length a [`Status`] occupies for `generation`, used by callers
    /// that must decide whether a register-read payload is a `Status` or
    /// plain register words before calling [`Self::from_bytes`].
    #[must_use]
    pub fn expected_len(generation: StatusGeneration) -> usize {
        match generation {
            StatusGeneration::Gen1 | StatusGeneration::Gen1Plus => LEGACY_LEN,
            StatusGeneration::Gen2 => GEN2_LEN,
        }
    }

    /// Decodes a [`Status`] for the given protocol generation.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedLength`] if the input does not match the
    /// generation's fixed wire length (20 bytes for `Gen1`/`Gen1Plus`, 25
    /// for `Gen2`).
    pub fn from_bytes(bytes: &[u8], generation: StatusGeneration) -> Result<Self> {
        match generation {
            StatusGeneration::Gen1 | StatusGeneration::Gen1Plus => Self::decode_legacy(bytes),
            StatusGeneration::Gen2 => Self::decode_gen2(bytes),
        }
    }

    fn decode_legacy(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != LEGACY_LEN {
            return Err(ProtocolError::UnexpectedLength { expected: LEGACY_LEN, actual: bytes.len() });
        }
        let mut r = ByteReader::new(bytes);
        let torque_raw = r.read_u16()?;
        let speed = r.read_u16()?;
        let current = r.read_u16()?;
        let preset = r.read_u8()?;
        let flags = r.read_u8()?;
        let alarm = r.read_u8()?;
        let direction = Direction::from_u8(r.read_u8()?).unwrap_or_default();
        let remain_screw = r.read_u16()?;
        let inputs = bitmap16(r.read_u16()?);
        let outputs = bitmap16(r.read_u16()?);
        let temperature_raw = r.read_u16()?;

        Ok(Self {
            torque: f32::from(torque_raw) * 0.01,
            speed,
            current,
            preset,
            model: None,
            torque_up: flags & 0x01 != 0,
            fasten_ok: flags & 0x02 != 0,
            ready: flags & 0x04 != 0,
            run: flags & 0x08 != 0,
            alarm,
            direction,
            remain_screw,
            inputs,
            outputs,
            temperature: f32::from(temperature_raw) * 0.1,
            is_lock: None,
        })
    }

    fn decode_gen2(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != GEN2_LEN {
            return Err(ProtocolError::UnexpectedLength { expected: GEN2_LEN, actual: bytes.len() });
        }
        let mut r = ByteReader::new(bytes);
        let torque = r.read_f32()?;
        let speed = r.read_u16()?;
        let current = r.read_u16()?;
        let preset = r.read_u8()?;
        let model = r.read_u16()?;
        let flags = r.read_u8()?;
        let alarm = r.read_u8()?;
        let direction = Direction::from_u8(r.read_u8()?).unwrap_or_default();
        let remain_screw = r.read_u16()?;
        let inputs = bitmap16(r.read_u16()?);
        let outputs = bitmap16(r.read_u16()?);
        let temperature = r.read_f32()?;
        let is_lock = r.read_u8()? != 0;

        Ok(Self {
            torque,
            speed,
            current,
            preset,
            model: Some(model),
            torque_up: flags & 0x01 != 0,
            fasten_ok: flags & 0x02 != 0,
            ready: flags & 0x04 != 0,
            run: flags & 0x08 != 0,
            alarm,
            direction,
            remain_screw,
            inputs,
            outputs,
            temperature,
            is_lock: Some(is_lock),
        })
    }
}
