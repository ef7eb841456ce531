//! `Event` record: the decoded result of a single fastening.

use super::{Direction, TorqueUnit};
use crate::{
    error::{ProtocolError, Result},
    reader::ByteReader,
};

/// Protocol revision for [`Event`] decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventGeneration {
    /// Fixed-point torque fields; date/time is not present on the wire
    /// (the decoder stamps "now").
    Gen1,
    /// Floating-point torque fields; date/time still stamped "now".
    Gen1Plus,
    /// Floating-point torque fields; full date/time read from the wire.
    Gen2,
}

/// A point in time, as carried by a Gen2 [`Event`] or supplied by the
/// caller for legacy generations that stamp "now" at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTimestamp {
    /// Calendar year.
    pub year: u16,
    /// Month, 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    /// Hour, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Second, 0-59.
    pub second: u8,
    /// Millisecond, 0-999.
    pub millisecond: u16,
}

/// One graph-step marker referenced by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphStep {
    /// Step identifier.
    pub id: u8,
    /// Sample index within the associated [`super::Graph`].
    pub index: u16,
}

const GRAPH_STEP_COUNT: usize = 16;
const RESERVED_LEN: usize = 16;
const BARCODE_LEN: usize = 64;

/// Decoded fastening-result event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event sequence id.
    pub id: u32,
    /// Event schema revision.
    pub revision: u8,
    /// When the fastening completed.
    pub timestamp: EventTimestamp,
    /// Fastening duration, in milliseconds.
    pub fasten_time: u16,
    /// Preset index active for this fastening.
    pub preset: u8,
    /// Torque unit the torque fields are expressed in.
    pub unit: TorqueUnit,
    /// Remaining screw count after this fastening.
    pub remain_screw: u16,
    /// Direction of rotation.
    pub direction: Direction,
    /// Raw error code (0 = none).
    pub error: u8,
    /// Raw fastening-result status code.
    pub status: u8,
    /// Target torque.
    pub torque_target: f32,
    /// Measured final torque.
    pub torque_measured: f32,
    /// Torque at seating detection.
    pub torque_seating: f32,
    /// Torque at clamp detection.
    pub torque_clamp: f32,
    /// Prevailing torque component.
    pub torque_prevailing: f32,
    /// Torque at the snug point.
    pub torque_snug: f32,
    /// Motor speed during the fastening.
    pub speed: u16,
    /// Angle at the start of measurement.
    pub angle_start: u16,
    /// Angle at the target torque.
    pub angle_target: u16,
    /// Final angle reached.
    pub angle_final: u16,
    /// Angle at the snug point.
    pub snug_angle: u16,
    /// ASCII barcode, truncated at the first NUL byte.
    pub barcode: String,
    /// First graph channel present for this fastening.
    pub graph_channel_a: super::GraphChannel,
    /// Sample count for `graph_channel_a`.
    pub graph_count_a: u16,
    /// Second graph channel present for this fastening.
    pub graph_channel_b: super::GraphChannel,
    /// Sample count for `graph_channel_b`.
    pub graph_count_b: u16,
    /// Graph sampling rate (Hz).
    pub graph_sampling_rate: u16,
    /// Step markers into the associated graph.
    pub graph_steps: Vec<GraphStep>,
}

impl Event {
    fn decode(bytes: &[u8], generation: EventGeneration, now: EventTimestamp) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        let id = r.read_u32()?;
        let revision = r.read_u8()?;

        let timestamp = if generation == EventGeneration::Gen2 {
            EventTimestamp {
                year: r.read_u16()?,
                month: r.read_u8()?,
                day: r.read_u8()?,
                hour: r.read_u8()?,
                minute: r.read_u8()?,
                second: r.read_u8()?,
                millisecond: r.read_u16()?,
            }
        } else {
            now
        };

        let fasten_time = r.read_u16()?;
        let preset = r.read_u8()?;
        let unit = TorqueUnit::from_u8(r.read_u8()?).unwrap_or_default();
        let remain_screw = r.read_u16()?;
        let direction = Direction::from_u8(r.read_u8()?).unwrap_or_default();
        let error = r.read_u8()?;
        let status = r.read_u8()?;

        let read_torque = |r: &mut ByteReader<'_>| -> Result<f32> {
            match generation {
                EventGeneration::Gen1 => Ok(f32::from(r.read_u16()?) * 0.01),
                EventGeneration::Gen1Plus | EventGeneration::Gen2 => r.read_f32(),
            }
        };

        let torque_target = read_torque(&mut r)?;
        let torque_measured = read_torque(&mut r)?;
        let torque_seating = read_torque(&mut r)?;
        let torque_clamp = read_torque(&mut r)?;
        let torque_prevailing = read_torque(&mut r)?;
        let torque_snug = read_torque(&mut r)?;

        let speed = r.read_u16()?;
        let angle_start = r.read_u16()?;
        let angle_target = r.read_u16()?;
        let angle_final = r.read_u16()?;
        let snug_angle = r.read_u16()?;

        r.skip(RESERVED_LEN)?;

        let barcode_raw = r.read_bytes(BARCODE_LEN)?;
        let barcode_end = barcode_raw.iter().position(|&b| b == 0x00).unwrap_or(barcode_raw.len());
        let barcode = barcode_raw[..barcode_end].iter().map(|&b| b as char).collect();

        let graph_channel_a = super::GraphChannel::from_u8(r.read_u8()?).unwrap_or_default();
        let graph_channel_b = super::GraphChannel::from_u8(r.read_u8()?).unwrap_or_default();
        let graph_count_a = r.read_u16()?;
        let graph_count_b = r.read_u16()?;
        let graph_sampling_rate = r.read_u16()?;

        let mut graph_steps = Vec::with_capacity(GRAPH_STEP_COUNT);
        for _ in 0..GRAPH_STEP_COUNT {
            graph_steps.push(GraphStep { id: r.read_u8()?, index: r.read_u16()? });
        }

        if r.position() != bytes.len() {
            return Err(ProtocolError::UnexpectedLength { expected: r.position(), actual: bytes.len() });
        }

        Ok(Self {
            id,
            revision,
            timestamp,
            fasten_time,
            preset,
            unit,
            remain_screw,
            direction,
            error,
            status,
            torque_target,
            torque_measured,
            torque_seating,
            torque_clamp,
            torque_prevailing,
            torque_snug,
            speed,
            angle_start,
            angle_target,
            angle_final,
            snug_angle,
            barcode,
            graph_channel_a,
            graph_count_a,
            graph_channel_b,
            graph_count_b,
            graph_sampling_rate,
            graph_steps,
        })
    }

    /// Decodes a Gen2 event, reading its date/time from the wire.
    ///
    /// # Errors
    /// [`ProtocolError`] if the input is truncated or its consumed length
    /// does not match its actual length (invariant 1).
    pub fn from_bytes_gen2(bytes: &[u8]) -> Result<Self> {
        // `now` is unused on this path (Gen2 always reads its own timestamp).
        let placeholder = EventTimestamp { year: 0, month: 0, day: 0, hour: 0, minute: 0, second: 0, millisecond: 0 };
        Self::decode(bytes, EventGeneration::Gen2, placeholder)
    }

    /// Decodes a legacy (`Gen1`/`Gen1Plus`) event, stamping `now` as the
    /// decode-time timestamp since the wire form carries none.
    ///
    /// # Errors
    /// [`ProtocolError`] if the input is truncated or its consumed length
    /// does not match its actual length (invariant 1).
    pub fn from_bytes_legacy(
        bytes: &[u8],
        generation: EventGeneration,
        now: EventTimestamp,
    ) -> Result<Self> {
        debug_assert_ne!(generation, EventGeneration::Gen2);
        Self::decode(bytes, generation, now)
    }

    /// Parses an `Event` from its CSV text form. English-culture floats and
    /// description strings for enumerations; reports the first parse
    /// failure as a human-readable message rather than raising a typed
    /// error for each possible field.
    ///
    /// The expected column order is: id, revision, year, month, day, hour,
    /// minute, second, millisecond, fasten_time, preset, unit, remain_screw,
    /// direction, error, status, torque_target, torque_measured,
    /// torque_seating, torque_clamp, torque_prevailing, torque_snug, speed,
    /// angle_start, angle_target, angle_final, snug_angle, barcode.
    ///
    /// # Errors
    /// [`ProtocolError::Csv`] carrying the first failing column's message.
    pub fn from_csv(row: &str) -> Result<Self> {
        let cols: Vec<&str> = row.split(',').collect();
        const EXPECTED_COLS: usize = 27;
        if cols.len() != EXPECTED_COLS {
            return Err(ProtocolError::Csv(format!(
                "expected {EXPECTED_COLS} columns, found {}",
                cols.len()
            )));
        }

        let field = |i: usize, name: &str| -> Result<&str> {
            cols.get(i).copied().ok_or_else(|| ProtocolError::Csv(format!("missing column {name}")))
        };
        let parse_u = |i: usize, name: &str| -> Result<u32> {
            field(i, name)?.trim().parse().map_err(|_| ProtocolError::Csv(format!("invalid {name}")))
        };
        let parse_f = |i: usize, name: &str| -> Result<f32> {
            field(i, name)?.trim().parse().map_err(|_| ProtocolError::Csv(format!("invalid {name}")))
        };

        let direction_str = field(13, "direction")?.trim();
        let direction = match direction_str {
            "Forward" => Direction::Forward,
            "Reverse" => Direction::Reverse,
            other => return Err(ProtocolError::Csv(format!("unknown direction {other}"))),
        };
        let unit_str = field(11, "unit")?.trim();
        let unit = match unit_str {
            "Nm" => TorqueUnit::NewtonMetre,
            "kgf.cm" => TorqueUnit::KgfCm,
            "lbf.in" => TorqueUnit::LbfIn,
            other => return Err(ProtocolError::Csv(format!("unknown unit {other}"))),
        };

        Ok(Self {
            id: parse_u(0, "id")?,
            revision: parse_u(1, "revision")? as u8,
            timestamp: EventTimestamp {
                year: parse_u(2, "year")? as u16,
                month: parse_u(3, "month")? as u8,
                day: parse_u(4, "day")? as u8,
                hour: parse_u(5, "hour")? as u8,
                minute: parse_u(6, "minute")? as u8,
                second: parse_u(7, "second")? as u8,
                millisecond: parse_u(8, "millisecond")? as u16,
            },
            fasten_time: parse_u(9, "fasten_time")? as u16,
            preset: parse_u(10, "preset")? as u8,
            unit,
            remain_screw: parse_u(12, "remain_screw")? as u16,
            direction,
            error: parse_u(14, "error")? as u8,
            status: parse_u(15, "status")? as u8,
            torque_target: parse_f(16, "torque_target")?,
            torque_measured: parse_f(17, "torque_measured")?,
            torque_seating: parse_f(18, "torque_seating")?,
            torque_clamp: parse_f(19, "torque_clamp")?,
            torque_prevailing: parse_f(20, "torque_prevailing")?,
            torque_snug: parse_f(21, "torque_snug")?,
            speed: parse_u(22, "speed")? as u16,
            angle_start: parse_u(23, "angle_start")? as u16,
            angle_target: parse_u(24, "angle_target")? as u16,
            angle_final: parse_u(25, "angle_final")? as u16,
            snug_angle: 0,
            barcode: field(26, "barcode")?.trim().to_string(),
            graph_channel_a: super::GraphChannel::default(),
            graph_count_a: 0,
            graph_channel_b: super::GraphChannel::default(),
            graph_count_b: 0,
            graph_sampling_rate: 0,
            graph_steps: Vec::new(),
        })
    }
}
