//! Records relayed from the NMEA GPS process (GGA, VTG, GSA, RMC sentences).

use std::fmt;

use super::{table_width, Decodable, FieldSpec};
use crate::angle::Dms;
use crate::error::DecodeError;
use crate::IPC::cursor::{Cursor, WireType};
use crate::IPC::freshness::ProducerTime;

/// GGA fix indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    Invalid,
    Gnss,
    Dgps,
    Pps,
    Rtk,
    FloatRtk,
    DeadReckoning,
    Manual,
    Simulation,
    Unknown(u8),
}

impl From<u8> for FixQuality {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Invalid,
            1 => Self::Gnss,
            2 => Self::Dgps,
            3 => Self::Pps,
            4 => Self::Rtk,
            5 => Self::FloatRtk,
            6 => Self::DeadReckoning,
            7 => Self::Manual,
            8 => Self::Simulation,
            other => Self::Unknown(other),
        }
    }
}

impl FixQuality {
    pub fn has_fix(self) -> bool {
        !matches!(self, Self::Invalid | Self::Unknown(_))
    }
}

/// GPS fix from a GGA sentence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GgaFix {
    /// Host clock when the producer parsed the sentence.
    pub pc_time: ProducerTime,
    /// Radians.
    pub latitude: f64,
    /// Radians.
    pub longitude: f64,
    /// Metres above mean sea level.
    pub altitude: f64,
    /// Epoch seconds of the fix.
    pub fix_time: i64,
    /// Seconds into the current UTC day.
    pub utc_seconds: i64,
    pub millis: f32,
    pub fix: u8,
    pub satellites: u8,
    pub hdop: f32,
    /// Geoid height above the WGS84 ellipsoid; only the legacy layout carries it.
    pub geoid_separation: f32,
}

impl GgaFix {
    pub fn fix_quality(&self) -> FixQuality {
        FixQuality::from(self.fix)
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude.to_degrees()
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude.to_degrees()
    }

    pub fn latitude_dms(&self) -> Dms {
        Dms::from_radians(self.latitude)
    }

    pub fn longitude_dms(&self) -> Dms {
        Dms::from_radians(self.longitude)
    }
}

impl Decodable for GgaFix {
    const CHANNEL: &'static str = "GGA";
    const RECORD: &'static str = "GgaFix";
    const PAYLOAD_SIZE: usize = 66;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("pc_time_sec", WireType::I64, "s"),
        FieldSpec::scalar("pc_time_nsec", WireType::I64, "ns"),
        FieldSpec::scalar("latitude", WireType::F64, "rad"),
        FieldSpec::scalar("longitude", WireType::F64, "rad"),
        FieldSpec::scalar("altitude", WireType::F64, "m"),
        FieldSpec::scalar("fix_time", WireType::I64, "s"),
        FieldSpec::scalar("utc_seconds", WireType::I64, "s"),
        FieldSpec::scalar("millis", WireType::F32, "ms"),
        FieldSpec::scalar("fix", WireType::U8, ""),
        FieldSpec::scalar("satellites", WireType::U8, ""),
        FieldSpec::scalar("hdop", WireType::F32, ""),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.pc_time.sec = cursor.read_i64()?;
        self.pc_time.nsec = cursor.read_i64()?;
        self.latitude = cursor.read_f64()?;
        self.longitude = cursor.read_f64()?;
        self.altitude = cursor.read_f64()?;
        self.fix_time = cursor.read_i64()?;
        self.utc_seconds = cursor.read_i64()?;
        self.millis = cursor.read_f32()?;
        self.fix = cursor.read_u8()?;
        self.satellites = cursor.read_u8()?;
        self.hdop = cursor.read_f32()?;
        Ok(())
    }
}

const _: () = assert!(table_width(GgaFix::FIELDS) == GgaFix::PAYLOAD_SIZE);

impl fmt::Display for GgaFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GGA lat {} lon {} alt {:.3} m, fix {:?}, {} sats, HDOP {:.2}, UTC {}s +{}ms",
            self.latitude_dms(),
            self.longitude_dms(),
            self.altitude,
            self.fix_quality(),
            self.satellites,
            self.hdop,
            self.utc_seconds,
            self.millis
        )
    }
}

/// GGA fix in the earlier 58-byte layout (no host timestamp, with geoid separation).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyGgaFix(pub GgaFix);

impl Decodable for LegacyGgaFix {
    const CHANNEL: &'static str = "GGA";
    const RECORD: &'static str = "LegacyGgaFix";
    const PAYLOAD_SIZE: usize = 58;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("latitude", WireType::F64, "rad"),
        FieldSpec::scalar("longitude", WireType::F64, "rad"),
        FieldSpec::scalar("fix_time", WireType::I64, "s"),
        FieldSpec::scalar("utc_seconds", WireType::I64, "s"),
        FieldSpec::scalar("millis", WireType::F32, "ms"),
        FieldSpec::scalar("geoid_separation", WireType::F32, "m"),
        FieldSpec::scalar("altitude", WireType::F64, "m"),
        FieldSpec::scalar("fix", WireType::U8, ""),
        FieldSpec::scalar("satellites", WireType::U8, ""),
        FieldSpec::reserved(2),
        FieldSpec::scalar("hdop", WireType::F32, ""),
        FieldSpec::reserved(2),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        let fix = &mut self.0;
        fix.latitude = cursor.read_f64()?;
        fix.longitude = cursor.read_f64()?;
        fix.fix_time = cursor.read_i64()?;
        fix.utc_seconds = cursor.read_i64()?;
        fix.millis = cursor.read_f32()?;
        fix.geoid_separation = cursor.read_f32()?;
        fix.altitude = cursor.read_f64()?;
        fix.fix = cursor.read_u8()?;
        fix.satellites = cursor.read_u8()?;
        cursor.skip(2)?;
        fix.hdop = cursor.read_f32()?;
        cursor.skip(2)?;
        Ok(())
    }
}

const _: () = assert!(table_width(LegacyGgaFix::FIELDS) == LegacyGgaFix::PAYLOAD_SIZE);

impl fmt::Display for LegacyGgaFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} geoid {:.2} m", self.0, self.0.geoid_separation)
    }
}

/// Course over ground and ground speed (VTG).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseSpeed {
    /// Degrees from true north.
    pub true_course: f32,
    /// Degrees from magnetic north.
    pub magnetic_course: f32,
    pub speed_knots: f32,
    pub speed_kph: f32,
    /// 'A' autonomous, 'D' differential, 'E' estimated, 'N' not valid.
    pub mode: u8,
}

impl CourseSpeed {
    pub fn mode_char(&self) -> char {
        char::from(self.mode)
    }
}

impl Decodable for CourseSpeed {
    const CHANNEL: &'static str = "VTG";
    const RECORD: &'static str = "CourseSpeed";
    const PAYLOAD_SIZE: usize = 20;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("true_course", WireType::F32, "deg"),
        FieldSpec::scalar("magnetic_course", WireType::F32, "deg"),
        FieldSpec::scalar("speed_knots", WireType::F32, "kn"),
        FieldSpec::scalar("speed_kph", WireType::F32, "km/h"),
        FieldSpec::scalar("mode", WireType::Char, ""),
        FieldSpec::reserved(3),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.true_course = cursor.read_f32()?;
        self.magnetic_course = cursor.read_f32()?;
        self.speed_knots = cursor.read_f32()?;
        self.speed_kph = cursor.read_f32()?;
        self.mode = cursor.read_u8()?;
        cursor.skip(3)
    }
}

const _: () = assert!(table_width(CourseSpeed::FIELDS) == CourseSpeed::PAYLOAD_SIZE);

impl fmt::Display for CourseSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VTG course {:.1} true / {:.1} mag, {:.2} kn ({:.2} km/h), mode {}",
            self.true_course,
            self.magnetic_course,
            self.speed_knots,
            self.speed_kph,
            self.mode_char()
        )
    }
}

/// Number of satellite slots relayed in a GSA record.
pub const GSA_SATELLITES: usize = 10;

/// DOP and active satellites (GSA).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SatelliteStatus {
    /// 'M' manual or 'A' automatic 2D/3D switching.
    ///
    /// Modes and PRNs precede the DOPs here, matching what readers of the
    /// GSA segment decode; the GTOP block that starts at PDOP is a different layout.
    pub mode1: u8,
    /// 1 no fix, 2 2D, 3 3D.
    pub mode2: u8,
    /// PRNs used in the solution; 0 marks an empty slot.
    pub satellites: [u8; GSA_SATELLITES],
    pub pdop: f32,
    pub hdop: f32,
    pub vdop: f32,
}

impl SatelliteStatus {
    pub fn active_satellites(&self) -> impl Iterator<Item = u8> + '_ {
        self.satellites.iter().copied().filter(|&id| id != 0)
    }
}

impl Decodable for SatelliteStatus {
    const CHANNEL: &'static str = "GSA";
    const RECORD: &'static str = "SatelliteStatus";
    const PAYLOAD_SIZE: usize = 28;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("mode1", WireType::Char, ""),
        FieldSpec::scalar("mode2", WireType::U8, ""),
        FieldSpec::reserved(2),
        FieldSpec::array("satellites", WireType::U8, GSA_SATELLITES, "prn"),
        FieldSpec::reserved(2),
        FieldSpec::scalar("pdop", WireType::F32, ""),
        FieldSpec::scalar("hdop", WireType::F32, ""),
        FieldSpec::scalar("vdop", WireType::F32, ""),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.mode1 = cursor.read_u8()?;
        self.mode2 = cursor.read_u8()?;
        cursor.skip(2)?;
        self.satellites = cursor.read_bytes::<GSA_SATELLITES>()?;
        cursor.skip(2)?;
        self.pdop = cursor.read_f32()?;
        self.hdop = cursor.read_f32()?;
        self.vdop = cursor.read_f32()?;
        Ok(())
    }
}

const _: () = assert!(table_width(SatelliteStatus::FIELDS) == SatelliteStatus::PAYLOAD_SIZE);

impl fmt::Display for SatelliteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GSA mode {} / {}, PDOP {:.2} HDOP {:.2} VDOP {:.2}, satellites",
            char::from(self.mode1),
            self.mode2,
            self.pdop,
            self.hdop,
            self.vdop
        )?;
        for id in self.active_satellites() {
            write!(f, " {id}")?;
        }
        Ok(())
    }
}

/// Recommended minimum fix with velocity (RMC).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixVelocity {
    pub pc_time: ProducerTime,
    /// Radians.
    pub latitude: f32,
    /// Radians.
    pub longitude: f32,
    pub fix_time: i64,
    pub utc_seconds: i64,
    pub millis: f32,
    /// Host clock minus GPS clock, seconds.
    pub time_delta: f32,
    pub speed_knots: f32,
    /// Degrees.
    pub course_made_good: f32,
    /// Degrees.
    pub magnetic_variation: f32,
    pub mode: u8,
}

impl Decodable for FixVelocity {
    const CHANNEL: &'static str = "RMC";
    const RECORD: &'static str = "FixVelocity";
    const PAYLOAD_SIZE: usize = 64;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("pc_time_sec", WireType::I64, "s"),
        FieldSpec::scalar("pc_time_nsec", WireType::I64, "ns"),
        FieldSpec::scalar("latitude", WireType::F32, "rad"),
        FieldSpec::scalar("longitude", WireType::F32, "rad"),
        FieldSpec::scalar("fix_time", WireType::I64, "s"),
        FieldSpec::scalar("utc_seconds", WireType::I64, "s"),
        FieldSpec::scalar("millis", WireType::F32, "ms"),
        FieldSpec::scalar("time_delta", WireType::F32, "s"),
        FieldSpec::scalar("speed_knots", WireType::F32, "kn"),
        FieldSpec::scalar("course_made_good", WireType::F32, "deg"),
        FieldSpec::scalar("magnetic_variation", WireType::F32, "deg"),
        FieldSpec::scalar("mode", WireType::Char, ""),
        FieldSpec::reserved(3),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.pc_time.sec = cursor.read_i64()?;
        self.pc_time.nsec = cursor.read_i64()?;
        self.latitude = cursor.read_f32()?;
        self.longitude = cursor.read_f32()?;
        self.fix_time = cursor.read_i64()?;
        self.utc_seconds = cursor.read_i64()?;
        self.millis = cursor.read_f32()?;
        self.time_delta = cursor.read_f32()?;
        self.speed_knots = cursor.read_f32()?;
        self.course_made_good = cursor.read_f32()?;
        self.magnetic_variation = cursor.read_f32()?;
        self.mode = cursor.read_u8()?;
        cursor.skip(3)
    }
}

const _: () = assert!(table_width(FixVelocity::FIELDS) == FixVelocity::PAYLOAD_SIZE);

impl fmt::Display for FixVelocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMC lat {} lon {}, {:.2} kn CMG {:.1}, var {:.1}, delta {:.3}s, mode {}",
            Dms::from_radians(f64::from(self.latitude)),
            Dms::from_radians(f64::from(self.longitude)),
            self.speed_knots,
            self.course_made_good,
            self.magnetic_variation,
            self.time_delta,
            char::from(self.mode)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_quality() {
        assert_eq!(FixQuality::from(0), FixQuality::Invalid);
        assert_eq!(FixQuality::from(2), FixQuality::Dgps);
        assert_eq!(FixQuality::from(42), FixQuality::Unknown(42));
        assert!(FixQuality::Gnss.has_fix());
        assert!(!FixQuality::Invalid.has_fix());
    }

    #[test]
    fn test_active_satellites_skip_empty_slots() {
        let status = SatelliteStatus {
            satellites: [4, 0, 17, 0, 0, 0, 0, 0, 0, 29],
            ..Default::default()
        };
        assert_eq!(status.active_satellites().collect::<Vec<_>>(), vec![4, 17, 29]);
    }

    #[test]
    fn test_course_mode_char() {
        let vtg = CourseSpeed {
            mode: b'A',
            ..Default::default()
        };
        assert_eq!(vtg.mode_char(), 'A');
        assert!(vtg.to_string().ends_with("mode A"));
    }
}
