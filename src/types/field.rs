//! Field descriptors: one named, fixed-offset value in a packet

use std::sync::Arc;

use super::{ReaderKind, Transform, Value};
use crate::Result;

/// Advisory value bounds for presentation consumers.
///
/// Never used by the decoder to reject or clamp values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

impl DisplayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Default for DisplayRange {
    /// The debug view's default scale.
    fn default() -> Self {
        Self { min: -10.0, max: 10.0 }
    }
}

/// Describes one extractable telemetry value.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Key in every decoded reading; unique within a schema
    pub name: Arc<str>,
    /// Byte offset into the packet where the raw bytes begin
    pub offset: usize,
    /// Primitive reader, determines width and decode rule
    pub reader: ReaderKind,
    /// Optional conversion applied once after the raw decode
    pub transform: Option<Transform>,
    /// Advisory bounds for dashboards
    pub display_range: DisplayRange,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<Arc<str>>, offset: usize, reader: ReaderKind) -> Self {
        Self {
            name: name.into(),
            offset,
            reader,
            transform: None,
            display_range: DisplayRange::default(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_display_range(mut self, min: f64, max: f64) -> Self {
        self.display_range = DisplayRange::new(min, max);
        self
    }

    /// First byte past this field, `None` if the offset overflows.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.reader.size())
    }

    /// Read the raw value from `data` and apply the transform, if any.
    pub fn read(&self, data: &[u8]) -> Result<Value> {
        let raw = self.reader.read(data, self.offset)?;

        Ok(match (self.transform, raw.as_f64()) {
            (Some(transform), Some(numeric)) => Value::Float64(transform.apply(numeric)),
            _ => raw,
        })
    }
}
