//! Sequential, bounds-checked field extraction from a snapshot.
//!
//! The producer writes fields packed back to back, little-endian, with no
//! type tags. A [`Cursor`] walks those bytes in order; every read advances it by
//! the field's width, and a read that would run past the end leaves it where
//! it was.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::layout::PAYLOAD_OFFSET;
use crate::error::DecodeError;

/// Primitive field types the producer writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    I8,
    U8,
    Char,
    I32,
    U32,
    F32,
    I64,
    U64,
    F64,
}

impl WireType {
    /// Width of the field in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::I8 | Self::U8 | Self::Char => 1,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Short label used in schema listings.
    pub const fn label(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::Char => "char",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F64 => "f64",
        }
    }
}

/// A decoded field of any [`WireType`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I8(i8),
    U8(u8),
    Char(u8),
    I32(i32),
    U32(u32),
    F32(f32),
    I64(i64),
    U64(u64),
    F64(f64),
}

impl Value {
    /// The zero of `ty`, returned for lenient overruns.
    pub const fn zero(ty: WireType) -> Self {
        match ty {
            WireType::I8 => Self::I8(0),
            WireType::U8 => Self::U8(0),
            WireType::Char => Self::Char(0),
            WireType::I32 => Self::I32(0),
            WireType::U32 => Self::U32(0),
            WireType::F32 => Self::F32(0.0),
            WireType::I64 => Self::I64(0),
            WireType::U64 => Self::U64(0),
            WireType::F64 => Self::F64(0.0),
        }
    }

    /// Widen to f64 for display and plotting.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::I8(v) => f64::from(v),
            Self::U8(v) | Self::Char(v) => f64::from(v),
            Self::I32(v) => f64::from(v),
            Self::U32(v) => f64::from(v),
            Self::F32(v) => f64::from(v),
            Self::I64(v) => v as f64,
            Self::U64(v) => v as f64,
            Self::F64(v) => v,
        }
    }
}

/// What a cursor does when a field would read past the end of the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrunPolicy {
    /// Return [`DecodeError::BufferOverrun`].
    #[default]
    Strict,
    /// Return a zero value and count the overrun.
    Lenient,
}

/// A read position over one snapshot.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    policy: OverrunPolicy,
    overruns: usize,
}

impl<'a> Cursor<'a> {
    /// A cursor at offset 0, for decoding the header.
    pub fn new(buf: &'a [u8], policy: OverrunPolicy) -> Self {
        Self {
            buf,
            pos: 0,
            policy,
            overruns: 0,
        }
    }

    /// A cursor already past the header.
    pub fn at_payload(buf: &'a [u8], policy: OverrunPolicy) -> Self {
        Self {
            pos: PAYLOAD_OFFSET,
            ..Self::new(buf, policy)
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn policy(&self) -> OverrunPolicy {
        self.policy
    }

    /// Number of lenient overruns absorbed since the cursor was created.
    pub fn overruns(&self) -> usize {
        self.overruns
    }

    /// Reset to the start of the payload for the next pass.
    pub fn unpack_done(&mut self) {
        self.pos = PAYLOAD_OFFSET;
    }

    /// Take the next `N` bytes, or report an overrun without moving.
    ///
    /// `Ok(None)` means a lenient overrun: the caller substitutes zero.
    fn take<const N: usize>(&mut self) -> Result<Option<[u8; N]>, DecodeError> {
        let Some(bytes) = self.pos.checked_add(N).and_then(|end| self.buf.get(self.pos..end)) else {
            let err = DecodeError::BufferOverrun {
                offset: self.pos,
                needed: N,
                available: self.remaining(),
            };
            return match self.policy {
                OverrunPolicy::Strict => Err(err),
                OverrunPolicy::Lenient => {
                    self.overruns += 1;
                    warn!(%err, "lenient decode substituted zero");
                    Ok(None)
                }
            };
        };

        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos += N;
        Ok(Some(out))
    }

    /// Decode the next field of type `ty`.
    pub fn unpack(&mut self, ty: WireType) -> Result<Value, DecodeError> {
        Ok(match ty {
            WireType::I8 => Value::I8(self.read_i8()?),
            WireType::U8 => Value::U8(self.read_u8()?),
            WireType::Char => Value::Char(self.read_u8()?),
            WireType::I32 => Value::I32(self.read_i32()?),
            WireType::U32 => Value::U32(self.read_u32()?),
            WireType::F32 => Value::F32(self.read_f32()?),
            WireType::I64 => Value::I64(self.read_i64()?),
            WireType::U64 => Value::U64(self.read_u64()?),
            WireType::F64 => Value::F64(self.read_f64()?),
        })
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?.map_or(0, |b| b[0]))
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.take::<1>()?.map_or(0, i8::from_le_bytes))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(self.take::<4>()?.map_or(0, i32::from_le_bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(self.take::<4>()?.map_or(0, u32::from_le_bytes))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(self.take::<4>()?.map_or(0.0, f32::from_le_bytes))
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(self.take::<8>()?.map_or(0, i64::from_le_bytes))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(self.take::<8>()?.map_or(0, u64::from_le_bytes))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(self.take::<8>()?.map_or(0.0, f64::from_le_bytes))
    }

    /// Read the next `N` raw bytes.
    pub fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        Ok(self.take::<N>()?.unwrap_or([0; N]))
    }

    /// Consume `n` reserved bytes, keeping alignment with the producer's layout.
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        match self.pos.checked_add(n).filter(|end| *end <= self.buf.len()) {
            Some(end) => {
                self.pos = end;
                Ok(())
            }
            None => {
                let err = DecodeError::BufferOverrun {
                    offset: self.pos,
                    needed: n,
                    available: self.remaining(),
                };
                match self.policy {
                    OverrunPolicy::Strict => Err(err),
                    OverrunPolicy::Lenient => {
                        self.overruns += 1;
                        warn!(%err, "lenient decode skipped past end");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Scan a NUL-terminated string of at most `max` bytes (terminator included).
    ///
    /// On success the cursor sits just past the terminator. If no terminator
    /// is found within `max` bytes, or before the snapshot ends, the cursor does
    /// not move and [`DecodeError::Truncation`] is returned regardless of policy.
    pub fn read_cstr(&mut self, max: usize) -> Result<String, DecodeError> {
        let window = &self.buf[self.pos.min(self.buf.len())..];
        let window = &window[..window.len().min(max)];

        match window.iter().position(|&b| b == 0) {
            Some(len) => {
                let text = String::from_utf8_lossy(&window[..len]).into_owned();
                self.pos += len + 1;
                Ok(text)
            }
            None => Err(DecodeError::Truncation {
                offset: self.pos,
                max,
            }),
        }
    }
}
