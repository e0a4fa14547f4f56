//! Records relayed from the Trimble TSIP receiver process.

use std::fmt;

use super::{table_width, Decodable, FieldSpec};
use crate::angle::Dms;
use crate::error::DecodeError;
use crate::IPC::cursor::{Cursor, WireType};

/// PRN slots in a solution status record.
pub const MAX_PRN_COUNT: usize = 8;

/// Receiver position fix (TSIP 0x84, double precision LLA).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverPosition {
    /// Radians.
    pub latitude: f64,
    /// Radians.
    pub longitude: f64,
    /// Metres above the WGS84 ellipsoid.
    pub altitude: f64,
    /// Metres.
    pub clock_bias: f32,
    /// GPS seconds of week.
    pub fix_time: f32,
    pub valid: bool,
}

impl Decodable for ReceiverPosition {
    const CHANNEL: &'static str = "GPS_Position";
    const RECORD: &'static str = "ReceiverPosition";
    const PAYLOAD_SIZE: usize = 36;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("latitude", WireType::F64, "rad"),
        FieldSpec::scalar("longitude", WireType::F64, "rad"),
        FieldSpec::scalar("altitude", WireType::F64, "m"),
        FieldSpec::scalar("clock_bias", WireType::F32, "m"),
        FieldSpec::scalar("fix_time", WireType::F32, "s"),
        FieldSpec::scalar("valid", WireType::U8, ""),
        FieldSpec::reserved(3),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.latitude = cursor.read_f64()?;
        self.longitude = cursor.read_f64()?;
        self.altitude = cursor.read_f64()?;
        self.clock_bias = cursor.read_f32()?;
        self.fix_time = cursor.read_f32()?;
        self.valid = cursor.read_u8()? != 0;
        cursor.skip(3)
    }
}

const _: () = assert!(table_width(ReceiverPosition::FIELDS) == ReceiverPosition::PAYLOAD_SIZE);

impl fmt::Display for ReceiverPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TSIP position lat {} lon {} alt {:.2} m, bias {:.2} m, t {:.3}s{}",
            Dms::from_radians(self.latitude),
            Dms::from_radians(self.longitude),
            self.altitude,
            self.clock_bias,
            self.fix_time,
            if self.valid { "" } else { " [invalid]" }
        )
    }
}

/// Receiver ENU velocity fix (TSIP 0x56).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverVelocity {
    /// m/s.
    pub east: f32,
    /// m/s.
    pub north: f32,
    /// m/s.
    pub up: f32,
    /// m/s.
    pub clock_bias_rate: f32,
    pub fix_time: f32,
}

impl ReceiverVelocity {
    /// Horizontal ground speed, m/s.
    pub fn ground_speed(&self) -> f32 {
        self.east.hypot(self.north)
    }
}

impl Decodable for ReceiverVelocity {
    const CHANNEL: &'static str = "GPS_Velocity";
    const RECORD: &'static str = "ReceiverVelocity";
    const PAYLOAD_SIZE: usize = 20;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("east", WireType::F32, "m/s"),
        FieldSpec::scalar("north", WireType::F32, "m/s"),
        FieldSpec::scalar("up", WireType::F32, "m/s"),
        FieldSpec::scalar("clock_bias_rate", WireType::F32, "m/s"),
        FieldSpec::scalar("fix_time", WireType::F32, "s"),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.east = cursor.read_f32()?;
        self.north = cursor.read_f32()?;
        self.up = cursor.read_f32()?;
        self.clock_bias_rate = cursor.read_f32()?;
        self.fix_time = cursor.read_f32()?;
        Ok(())
    }
}

const _: () = assert!(table_width(ReceiverVelocity::FIELDS) == ReceiverVelocity::PAYLOAD_SIZE);

impl fmt::Display for ReceiverVelocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TSIP velocity E {:.3} N {:.3} U {:.3} m/s (ground {:.3}), bias rate {:.3}, t {:.3}s",
            self.east,
            self.north,
            self.up,
            self.ground_speed(),
            self.clock_bias_rate,
            self.fix_time
        )
    }
}

/// Solution dimension from the low bits of the solution byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionDimension {
    TwoD,
    ThreeD,
    Unknown(u8),
}

/// Satellite selection and DOPs (TSIP 0x6D).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverStatus {
    pub pdop: f32,
    pub hdop: f32,
    pub vdop: f32,
    pub tdop: f32,
    /// PRNs in view; only the first `satellites` entries are meaningful.
    pub prns: [u8; MAX_PRN_COUNT],
    /// Bits 0..2 dimension, bit 3 manual mode.
    pub solution: u8,
    pub satellites: u8,
}

impl ReceiverStatus {
    pub fn dimension(&self) -> SolutionDimension {
        match self.solution & 0x07 {
            3 => SolutionDimension::TwoD,
            4 => SolutionDimension::ThreeD,
            other => SolutionDimension::Unknown(other),
        }
    }

    pub fn is_manual(&self) -> bool {
        self.solution & 0x08 != 0
    }

    /// PRNs in use, clamped to the slot count.
    pub fn active_prns(&self) -> &[u8] {
        let n = usize::from(self.satellites).min(MAX_PRN_COUNT);
        &self.prns[..n]
    }
}

impl Decodable for ReceiverStatus {
    const CHANNEL: &'static str = "GPS_Solution";
    const RECORD: &'static str = "ReceiverStatus";
    const PAYLOAD_SIZE: usize = 26;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("pdop", WireType::F32, ""),
        FieldSpec::scalar("hdop", WireType::F32, ""),
        FieldSpec::scalar("vdop", WireType::F32, ""),
        FieldSpec::scalar("tdop", WireType::F32, ""),
        FieldSpec::array("prns", WireType::U8, MAX_PRN_COUNT, "prn"),
        FieldSpec::scalar("solution", WireType::U8, ""),
        FieldSpec::scalar("satellites", WireType::U8, ""),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.pdop = cursor.read_f32()?;
        self.hdop = cursor.read_f32()?;
        self.vdop = cursor.read_f32()?;
        self.tdop = cursor.read_f32()?;
        self.prns = cursor.read_bytes::<MAX_PRN_COUNT>()?;
        self.solution = cursor.read_u8()?;
        self.satellites = cursor.read_u8()?;
        Ok(())
    }
}

const _: () = assert!(table_width(ReceiverStatus::FIELDS) == ReceiverStatus::PAYLOAD_SIZE);

impl fmt::Display for ReceiverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = match self.dimension() {
            SolutionDimension::TwoD => "2D".to_string(),
            SolutionDimension::ThreeD => "3D".to_string(),
            SolutionDimension::Unknown(bits) => format!("dim {bits}"),
        };
        write!(
            f,
            "TSIP solution {dim} {}, PDOP {:.2} HDOP {:.2} VDOP {:.2} TDOP {:.2}, PRNs {:?}",
            if self.is_manual() { "manual" } else { "auto" },
            self.pdop,
            self.hdop,
            self.vdop,
            self.tdop,
            self.active_prns()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_bits() {
        let status = ReceiverStatus {
            solution: 0x0C,
            ..Default::default()
        };
        assert_eq!(status.dimension(), SolutionDimension::ThreeD);
        assert!(status.is_manual());

        let status = ReceiverStatus {
            solution: 0x03,
            ..Default::default()
        };
        assert_eq!(status.dimension(), SolutionDimension::TwoD);
        assert!(!status.is_manual());

        let status = ReceiverStatus {
            solution: 0x01,
            ..Default::default()
        };
        assert_eq!(status.dimension(), SolutionDimension::Unknown(1));
    }

    #[test]
    fn test_active_prns_clamped() {
        let status = ReceiverStatus {
            prns: [1, 2, 3, 4, 5, 6, 7, 8],
            satellites: 12,
            ..Default::default()
        };
        assert_eq!(status.active_prns().len(), MAX_PRN_COUNT);

        let status = ReceiverStatus {
            prns: [9, 11, 0, 0, 0, 0, 0, 0],
            satellites: 2,
            ..Default::default()
        };
        assert_eq!(status.active_prns(), &[9, 11]);
    }

    #[test]
    fn test_ground_speed() {
        let v = ReceiverVelocity {
            east: 3.0,
            north: 4.0,
            ..Default::default()
        };
        assert!((v.ground_speed() - 5.0).abs() < 1e-6);
    }
}
