//! Radian angles rendered as degrees, minutes and seconds for display.

use std::fmt;

/// An angle split into degrees, minutes and seconds.
///
/// Seconds are rounded to three decimals (millimetre scale on the ground).
/// The sign lives in `negative` so that angles between -1° and 0° keep it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub negative: bool,
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: f64,
}

impl Dms {
    pub fn from_radians(rad: f64) -> Self {
        Self::from_degrees(rad.to_degrees())
    }

    pub fn from_degrees(deg: f64) -> Self {
        let x = deg.abs();
        let degrees = x.floor();
        let x = (x - degrees) * 60.0;
        let mut minutes = x.floor() as u32;
        let mut seconds = ((x - x.floor()) * 60.0 * 1000.0).round() / 1000.0;
        let mut degrees = degrees as u32;
        // rounding can land on a full minute
        if seconds >= 60.0 {
            seconds -= 60.0;
            minutes += 1;
        }
        if minutes >= 60 {
            minutes -= 60;
            degrees += 1;
        }
        Self {
            negative: deg < 0.0,
            degrees,
            minutes,
            seconds,
        }
    }

    /// Degrees with the sign applied, as the dashboard displays them.
    pub fn signed_degrees(&self) -> i64 {
        let d = i64::from(self.degrees);
        if self.negative {
            -d
        } else {
            d
        }
    }

    pub fn to_decimal_degrees(&self) -> f64 {
        let magnitude =
            f64::from(self.degrees) + f64::from(self.minutes) / 60.0 + self.seconds / 3600.0;
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl fmt::Display for Dms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        write!(
            f,
            "{sign}{}\u{b0} {}' {:.3}\"",
            self.degrees, self.minutes, self.seconds
        )
    }
}
