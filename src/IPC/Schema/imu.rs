use std::fmt;

use super::{table_width, Decodable, FieldSpec};
use crate::error::DecodeError;
use crate::IPC::cursor::{Cursor, WireType};
use crate::IPC::freshness::ProducerTime;

/// One reading from the inertial measurement unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImuSample {
    /// Host clock when the sensor was read.
    pub read_time: ProducerTime,
    /// x, y, z in m/s².
    pub acceleration: [f64; 3],
    /// x, y, z in gauss.
    pub magnetic: [f64; 3],
    /// x, y, z in rad/s.
    pub gyro: [f64; 3],
    /// Degrees Celsius.
    pub temperature: f64,
    /// Whether the sensor read completed.
    pub success: bool,
}

fn read_vec3(cursor: &mut Cursor<'_>) -> Result<[f64; 3], DecodeError> {
    Ok([cursor.read_f64()?, cursor.read_f64()?, cursor.read_f64()?])
}

impl Decodable for ImuSample {
    const CHANNEL: &'static str = "IMU";
    const RECORD: &'static str = "ImuSample";
    const PAYLOAD_SIZE: usize = 100;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("read_time_sec", WireType::I64, "s"),
        FieldSpec::scalar("read_time_nsec", WireType::I64, "ns"),
        FieldSpec::array("acceleration", WireType::F64, 3, "m/s^2"),
        FieldSpec::array("magnetic", WireType::F64, 3, "gauss"),
        FieldSpec::array("gyro", WireType::F64, 3, "rad/s"),
        FieldSpec::scalar("temperature", WireType::F64, "degC"),
        FieldSpec::scalar("success", WireType::U8, ""),
        FieldSpec::reserved(3),
    ];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.read_time.sec = cursor.read_i64()?;
        self.read_time.nsec = cursor.read_i64()?;
        self.acceleration = read_vec3(cursor)?;
        self.magnetic = read_vec3(cursor)?;
        self.gyro = read_vec3(cursor)?;
        self.temperature = cursor.read_f64()?;
        self.success = cursor.read_u8()? != 0;
        cursor.skip(3)
    }
}

const _: () = assert!(table_width(ImuSample::FIELDS) == ImuSample::PAYLOAD_SIZE);

impl fmt::Display for ImuSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [ax, ay, az] = self.acceleration;
        let [mx, my, mz] = self.magnetic;
        let [gx, gy, gz] = self.gyro;
        write!(
            f,
            "IMU acc ({ax:.3}, {ay:.3}, {az:.3}) mag ({mx:.3}, {my:.3}, {mz:.3}) \
             gyro ({gx:.4}, {gy:.4}, {gz:.4}) temp {:.1}C{}",
            self.temperature,
            if self.success { "" } else { " [read failed]" }
        )
    }
}
