//! Wire codecs (C5): Big-Endian struct readers producing strongly-typed
//! decoded records, each with strict size and range invariants.
//!
//! Every codec follows the same "fallible constructor" shape:
//! `from_bytes(&[u8]) -> Result<Self>` rejects any input whose consumed
//! length differs from the input length (invariant 1), and a `default`/
//! `empty` constructor produces the zero record. Enumerations never abort
//! decoding on an out-of-range raw value (invariant 2): the field keeps its
//! `Default` and decoding continues.

pub mod caldata;
pub mod event;
pub mod graph;
pub mod info;
pub mod status;

pub use caldata::{BodyType, CalData};
pub use event::{Event, EventGeneration};
pub use graph::{Graph, GraphChannel};
pub use info::{DeviceInfo, Manufacturer, Model, SimpleInfo};
pub use status::{Status, StatusGeneration};

/// Direction of rotation, shared by [`Status`] and [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Clockwise / tightening.
    #[default]
    Forward,
    /// Counter-clockwise / loosening.
    Reverse,
}

impl Direction {
    /// Range-checks a raw wire value. Unknown values are reported as
    /// `None`; callers keep [`Direction::default`] rather than treating
    /// this as a decode error (invariant 2).
    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Forward),
            1 => Some(Self::Reverse),
            _ => None,
        }
    }
}

/// Torque unit tag carried by [`Event`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TorqueUnit {
    /// Newton-metres.
    #[default]
    NewtonMetre,
    /// Kilogram-force centimetres.
    KgfCm,
    /// Pound-force inches.
    LbfIn,
}

impl TorqueUnit {
    /// Range-checks a raw wire value; unknown values leave the field at
    /// [`TorqueUnit::default`].
    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::NewtonMetre),
            1 => Some(Self::KgfCm),
            2 => Some(Self::LbfIn),
            _ => None,
        }
    }
}
