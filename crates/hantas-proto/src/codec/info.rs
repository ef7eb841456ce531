//! Device info records: the modern 200-byte [`DeviceInfo`] block and the
//! 13-byte legacy [`SimpleInfo`].

use crate::{
    error::{ProtocolError, Result},
    reader::ByteReader,
};

/// Registers occupied by the legacy `FormatInfo` read (variant exposes this
/// as a 54-register count rather than the 200-byte Gen2 block).
pub const INFO_REGISTER_COUNT_LEGACY: u16 = 54;

/// Byte length of the Gen2 [`DeviceInfo`] block.
pub const INFO_BYTE_LEN_GEN2: usize = 200;

/// Known driver/controller model codes. Closed set; an unrecognized wire
/// value leaves the field at [`Model::default`] rather than failing to
/// decode (invariant 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    /// Default/fallback model tag used when the wire code is unrecognized.
    #[default]
    Ad,
    /// A recognized model code, carried verbatim.
    Code(u8),
}

impl Model {
    /// Closed set of codes this decoder recognizes. Anything else decodes
    /// to [`Model::default`].
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        (code <= 63).then_some(Self::Code(code))
    }
}

/// Manufacturer tag derived from [`DeviceInfo`]'s raw manufacturer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Manufacturer {
    /// Hantas-branded hardware.
    #[default]
    Hantas,
    /// Any other or unrecognized manufacturer code.
    Other(u16),
}

impl Manufacturer {
    fn from_code(code: u16) -> Self {
        if code == 0 { Self::Hantas } else { Self::Other(code) }
    }
}

/// Gen2 device info block (200 bytes): driver/controller identity,
/// firmware, production date, MAC, and manufacturer metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceInfo {
    /// System/product word.
    pub system: u16,
    /// Driver unit identifier.
    pub driver_id: u16,
    /// Driver model number.
    pub driver_model_number: u16,
    /// Driver model name (ASCII, trimmed).
    pub driver_model_name: String,
    /// Driver serial number (ASCII, trimmed).
    pub driver_serial: String,
    /// Controller unit identifier.
    pub controller_id: u16,
    /// Controller model name (ASCII, trimmed).
    pub controller_name: String,
    /// Controller serial number (ASCII, trimmed).
    pub controller_serial: String,
    /// Firmware major version.
    pub firmware_major: u8,
    /// Firmware minor version.
    pub firmware_minor: u8,
    /// Firmware patch version.
    pub firmware_patch: u8,
    /// Production date as `YYYYMMDD`.
    pub production_date: u32,
    /// Advance/feature flag byte.
    pub advance_flag: u8,
    /// MAC address (6 bytes).
    pub mac: [u8; 6],
    /// Event-data schema revision.
    pub event_data_revision: u8,
    /// Raw manufacturer code; use [`Self::manufacturer`] for the derived tag.
    pub manufacturer_code: u16,
}

impl DeviceInfo {
    const DRIVER_MODEL_NAME_LEN: usize = 32;
    const SERIAL_LEN: usize = 10;

    /// Decodes a Gen2 [`DeviceInfo`] from its 200-byte wire form.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedLength`] if `bytes.len() != 200`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != INFO_BYTE_LEN_GEN2 {
            return Err(ProtocolError::UnexpectedLength {
                expected: INFO_BYTE_LEN_GEN2,
                actual: bytes.len(),
            });
        }
        let mut r = ByteReader::new(bytes);
        let info = Self {
            system: r.read_u16()?,
            driver_id: r.read_u16()?,
            driver_model_number: r.read_u16()?,
            driver_model_name: r.read_ascii(Self::DRIVER_MODEL_NAME_LEN)?,
            driver_serial: r.read_ascii(Self::SERIAL_LEN)?,
            controller_id: r.read_u16()?,
            controller_name: r.read_ascii(Self::DRIVER_MODEL_NAME_LEN)?,
            controller_serial: r.read_ascii(Self::SERIAL_LEN)?,
            firmware_major: r.read_u8()?,
            firmware_minor: r.read_u8()?,
            firmware_patch: r.read_u8()?,
            production_date: r.read_u32()?,
            advance_flag: r.read_u8()?,
            mac: {
                let raw = r.read_bytes(6)?;
                [raw[0], raw[1], raw[2], raw[3], raw[4], raw[5]]
            },
            event_data_revision: r.read_u8()?,
            manufacturer_code: r.read_u16()?,
        };
        let consumed = r.position();
        r.skip(bytes.len() - consumed)?;
        Ok(info)
    }

    /// Firmware version string `"M.m.p"`.
    #[must_use]
    pub fn firmware_version(&self) -> String {
        format!("{}.{}.{}", self.firmware_major, self.firmware_minor, self.firmware_patch)
    }

    /// MAC address as colon-separated hex.
    #[must_use]
    pub fn mac_hex(&self) -> String {
        self.mac.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(":")
    }

    /// Derived manufacturer tag.
    #[must_use]
    pub fn manufacturer(&self) -> Manufacturer {
        Manufacturer::from_code(self.manufacturer_code)
    }
}

/// Legacy 13-byte device info record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleInfo {
    /// Device identifier.
    pub id: u8,
    /// Controller identifier.
    pub controller: u8,
    /// Driver identifier.
    pub driver: u8,
    /// Firmware major version.
    pub firmware_major: u8,
    /// Firmware minor version.
    pub firmware_minor: u8,
    /// Firmware patch version.
    pub firmware_patch: u8,
    /// Serial number, normalized from the raw five-byte field (see
    /// [`normalize_serial`]).
    pub serial: String,
    /// Model decoded from the normalized serial's model digits.
    pub model: Model,
    /// Usage count, if the device reported one (`0xFFFF` means absent).
    pub usage_count: Option<u16>,
}

impl SimpleInfo {
    const WIRE_LEN: usize = 13;

    /// Decodes a [`SimpleInfo`] from its 13-byte wire form.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedLength`] if `bytes.len() != 13`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::WIRE_LEN {
            return Err(ProtocolError::UnexpectedLength { expected: Self::WIRE_LEN, actual: bytes.len() });
        }
        let mut r = ByteReader::new(bytes);
        let id = r.read_u8()?;
        let controller = r.read_u8()?;
        let driver = r.read_u8()?;
        let firmware_major = r.read_u8()?;
        let firmware_minor = r.read_u8()?;
        let firmware_patch = r.read_u8()?;
        let raw_serial = r.read_bytes(5)?;
        let usage_count_raw = r.read_u16()?;

        let (serial, model) = normalize_serial(&raw_serial);
        let usage_count = (usage_count_raw != 0xFFFF).then_some(usage_count_raw);

        Ok(Self {
            id,
            controller,
            driver,
            firmware_major,
            firmware_minor,
            firmware_patch,
            serial,
            model,
            usage_count,
        })
    }
}

/// Normalizes the five raw legacy serial bytes into a serial string plus
/// the model decoded from its embedded model digits.
///
/// Each byte is formatted as a (at least) two-digit decimal and the bytes
/// are concatenated in reverse order. A known firmware defect produces a
/// 14-character string for certain byte combinations; when that happens the
/// serial is replaced with a synthesized 10-character string built from the
/// middle raw byte alone. In both cases, if the substring at positions
/// `4..6` of the resulting string decodes to a recognized [`Model`], that
/// model is used; otherwise the model defaults to [`Model::Ad`] and the
/// serial's final character is dropped.
#[must_use]
pub fn normalize_serial(raw: &[u8]) -> (String, Model) {
    debug_assert_eq!(raw.len(), 5);

    let mut serial: String = raw.iter().rev().map(|b| format!("{b:02}")).collect();

    if serial.len() == 14 {
        let middle = raw[2];
        serial = format!("{middle:010}");
    }

    let model_digits = serial.get(4..6).and_then(|s| s.parse::<u8>().ok());
    let model = model_digits.and_then(Model::from_code);

    match model {
        Some(model) => (serial, model),
        None => {
            let trimmed = if serial.is_empty() { serial } else { serial[..serial.len() - 1].to_string() };
            (trimmed, Model::default())
        },
    }
}
