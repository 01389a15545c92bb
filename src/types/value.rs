//! Decoded field values

use serde::Serialize;

/// A single decoded field value.
///
/// Serializes as the bare JSON primitive. Non-finite floats become `null`,
/// which is what browser clients already expect from `JSON.stringify`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    UInt8(u8),
    Int8(i8),
    UInt16(u16),
    UInt32(u32),
    Float32(f32),
    /// Output of a field transform
    Float64(f64),
}

impl Value {
    /// Numeric view of the value, `None` for booleans.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Bool(_) => None,
            Value::UInt8(v) => Some(v as f64),
            Value::Int8(v) => Some(v as f64),
            Value::UInt16(v) => Some(v as f64),
            Value::UInt32(v) => Some(v as f64),
            Value::Float32(v) => Some(v as f64),
            Value::Float64(v) => Some(v),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}
