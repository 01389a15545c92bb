//! Primitive reader kinds for fixed-layout packet fields

use serde::{Deserialize, Serialize};

use super::Value;
use crate::{RelayError, Result};

/// Closed set of primitive readers a field can use.
///
/// All multi-byte readers are little-endian, matching the layout Forza writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReaderKind {
    /// 32-bit float interpreted as a flag: `true` iff the value is strictly > 0.0
    #[serde(rename = "boolean", alias = "Boolean")]
    Boolean,
    /// 32-bit IEEE-754 float
    #[serde(rename = "float32", alias = "readFloatLE")]
    Float32,
    /// 8-bit unsigned integer
    #[serde(rename = "uint8", alias = "readUInt8")]
    UInt8,
    /// 8-bit signed integer
    #[serde(rename = "int8", alias = "readInt8")]
    Int8,
    /// 16-bit unsigned integer
    #[serde(rename = "uint16", alias = "readUInt16LE")]
    UInt16,
    /// 32-bit unsigned integer
    #[serde(rename = "uint32", alias = "readUInt32LE")]
    UInt32,
}

impl ReaderKind {
    /// Returns the number of bytes this reader consumes.
    pub const fn size(&self) -> usize {
        match self {
            ReaderKind::UInt8 | ReaderKind::Int8 => 1,
            ReaderKind::UInt16 => 2,
            ReaderKind::Boolean | ReaderKind::Float32 | ReaderKind::UInt32 => 4,
        }
    }

    /// Read one raw value starting at `offset`.
    ///
    /// Fails with [`RelayError::BufferTooShort`] when `data` does not hold
    /// `offset + size()` bytes. No range checks are applied to the value.
    pub fn read(&self, data: &[u8], offset: usize) -> Result<Value> {
        let end = offset.saturating_add(self.size());
        let bytes =
            data.get(offset..end).ok_or_else(|| RelayError::buffer_too_short(end, data.len()))?;

        let value = match self {
            ReaderKind::Boolean => {
                Value::Bool(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) > 0.0)
            }
            ReaderKind::Float32 => {
                Value::Float32(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            ReaderKind::UInt8 => Value::UInt8(bytes[0]),
            ReaderKind::Int8 => Value::Int8(bytes[0] as i8),
            ReaderKind::UInt16 => Value::UInt16(u16::from_le_bytes([bytes[0], bytes[1]])),
            ReaderKind::UInt32 => {
                Value::UInt32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
        };

        Ok(value)
    }
}
