use super::cursor::Cursor;
use super::freshness::ProducerTime;
use crate::error::DecodeError;

/// Size of the fixed header that starts every segment.
///
/// length (u64), update seconds (i64), update nanoseconds (i64),
/// scratch (f64), flag (i64).
pub const HEADER_SIZE: usize = 40;

/// Byte offset of the payload region, where the cursor starts after the header.
pub const PAYLOAD_OFFSET: usize = HEADER_SIZE;

pub const OFFSET_LENGTH: usize = 0;
pub const OFFSET_UPDATE_SEC: usize = 8;
pub const OFFSET_UPDATE_NSEC: usize = 16;
pub const OFFSET_SCRATCH: usize = 24;
pub const OFFSET_FLAG: usize = 32;

/// Total bytes mapped for a channel with `payload_size` bytes of payload.
pub const fn segment_size(payload_size: usize) -> usize {
    HEADER_SIZE + payload_size
}

/// The header every producer writes ahead of its payload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentHeader {
    /// Length field as written by the producer.
    pub length: u64,
    /// Producer clock at the last update.
    pub updated: ProducerTime,
    /// General-purpose double the producer may use.
    pub scratch: f64,
    /// Producer flag / counter ("look at me").
    pub flag: i64,
}

impl SegmentHeader {
    /// Decode the header from a cursor positioned at offset 0.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let length = cursor.read_u64()?;
        let sec = cursor.read_i64()?;
        let nsec = cursor.read_i64()?;
        let scratch = cursor.read_f64()?;
        let flag = cursor.read_i64()?;
        Ok(Self {
            length,
            updated: ProducerTime::new(sec, nsec),
            scratch,
            flag,
        })
    }
}
