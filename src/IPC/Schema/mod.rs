//! Message schemas: one record type per producer message, each with a field
//! table describing its wire layout and a decoder that walks that table.
//!
//! The table and the decoder must agree; the per-schema `const` assertions and
//! the tests below check that each table sums to the declared payload size and
//! that decoding a zeroed payload consumes exactly that many bytes.

use std::fmt;

use super::cursor::{Cursor, WireType};
use crate::error::DecodeError;

pub mod imu;
pub mod nmea;
pub mod text;
pub mod tsip;

pub use imu::ImuSample;
pub use nmea::{CourseSpeed, FixQuality, FixVelocity, GgaFix, LegacyGgaFix, SatelliteStatus};
pub use text::{Command, CommandBlock, LogFilename, MAX_TEXT_LEN};
pub use tsip::{ReceiverPosition, ReceiverStatus, ReceiverVelocity, SolutionDimension, MAX_PRN_COUNT};

/// Shape of one entry in a field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Scalar(WireType),
    Array(WireType, usize),
    /// Bytes the producer writes for alignment; consumed and discarded.
    Reserved(usize),
    /// NUL-terminated text occupying a fixed region.
    Text(usize),
}

impl FieldType {
    pub const fn width(self) -> usize {
        match self {
            Self::Scalar(ty) => ty.width(),
            Self::Array(ty, n) => ty.width() * n,
            Self::Reserved(n) | Self::Text(n) => n,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(ty) => f.write_str(ty.label()),
            Self::Array(ty, n) => write!(f, "[{}; {n}]", ty.label()),
            Self::Reserved(n) => write!(f, "reserved[{n}]"),
            Self::Text(n) => write!(f, "cstr[{n}]"),
        }
    }
}

/// One field of a message layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub unit: &'static str,
}

impl FieldSpec {
    pub const fn scalar(name: &'static str, ty: WireType, unit: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Scalar(ty),
            unit,
        }
    }

    pub const fn array(name: &'static str, ty: WireType, len: usize, unit: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Array(ty, len),
            unit,
        }
    }

    pub const fn reserved(len: usize) -> Self {
        Self {
            name: "reserved",
            ty: FieldType::Reserved(len),
            unit: "",
        }
    }

    pub const fn text(name: &'static str, len: usize) -> Self {
        Self {
            name,
            ty: FieldType::Text(len),
            unit: "",
        }
    }

    pub const fn width(&self) -> usize {
        self.ty.width()
    }
}

/// Sum of the widths of a field table.
pub const fn table_width(fields: &[FieldSpec]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < fields.len() {
        total += fields[i].width();
        i += 1;
    }
    total
}

/// A record that can be decoded from a channel's payload.
///
/// `decode` updates `self` in place, field by field, in wire order. If it
/// fails partway, fields already decoded hold the new values and the rest keep
/// their previous ones.
pub trait Decodable: Default + Clone + fmt::Debug + fmt::Display + Send + 'static {
    /// Segment name the producer publishes this message under.
    const CHANNEL: &'static str;
    /// Record type name, for listings.
    const RECORD: &'static str;
    /// Bytes of payload after the 40-byte header.
    const PAYLOAD_SIZE: usize;
    /// Wire layout, in order.
    const FIELDS: &'static [FieldSpec];

    /// Decode one payload from a cursor positioned at the payload start.
    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError>;
}

/// Static description of a registered schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaInfo {
    pub channel: &'static str,
    pub record: &'static str,
    pub payload_size: usize,
    pub fields: &'static [FieldSpec],
}

impl SchemaInfo {
    pub const fn of<T: Decodable>() -> Self {
        Self {
            channel: T::CHANNEL,
            record: T::RECORD,
            payload_size: T::PAYLOAD_SIZE,
            fields: T::FIELDS,
        }
    }
}

/// Every schema this crate can decode.
pub const SCHEMAS: &[SchemaInfo] = &[
    SchemaInfo::of::<GgaFix>(),
    SchemaInfo::of::<LegacyGgaFix>(),
    SchemaInfo::of::<CourseSpeed>(),
    SchemaInfo::of::<SatelliteStatus>(),
    SchemaInfo::of::<FixVelocity>(),
    SchemaInfo::of::<ImuSample>(),
    SchemaInfo::of::<ReceiverPosition>(),
    SchemaInfo::of::<ReceiverVelocity>(),
    SchemaInfo::of::<ReceiverStatus>(),
    SchemaInfo::of::<LogFilename>(),
    SchemaInfo::of::<CommandBlock>(),
];
