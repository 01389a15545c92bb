//! Field schema: the ordered, validated table every packet is decoded against.
//!
//! # Architecture
//!
//! - [`TelemetrySchema`] owns the field list and checks it once at construction
//! - [`forza`] holds the built-in Forza Horizon "Dash" layout
//! - [`file`] loads an alternative table from YAML
//!
//! A schema is built before any socket is opened and shared read-only
//! (`Arc<TelemetrySchema>`) by the decode loop for the rest of the process.
//! Any validation failure is a fatal [`RelayError::SchemaValidation`].

pub mod file;
pub mod forza;

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::types::{FieldDescriptor, ReaderKind};
use crate::{RelayError, Result};

pub use file::{FieldDefinition, SchemaDefinition};
pub use forza::dash_schema;

/// Ordered, immutable list of field descriptors.
#[derive(Debug, Clone)]
pub struct TelemetrySchema {
    fields: Vec<FieldDescriptor>,
    packet_len: usize,
}

impl TelemetrySchema {
    /// Create a new schema with validation.
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self> {
        let packet_len = Self::validate(&fields)?;
        debug!(fields = fields.len(), packet_len, "Telemetry schema built");
        Ok(Self { fields, packet_len })
    }

    /// Check every descriptor; returns the minimum decodable packet length.
    fn validate(fields: &[FieldDescriptor]) -> Result<usize> {
        let mut seen = HashSet::with_capacity(fields.len());
        let mut packet_len = 0;

        for field in fields {
            if field.name.trim().is_empty() {
                return Err(RelayError::schema_validation(format!(
                    "Field at offset {} has an empty name",
                    field.offset
                )));
            }

            if !seen.insert(field.name.as_ref()) {
                return Err(RelayError::schema_validation(format!(
                    "Duplicate field name '{}'",
                    field.name
                )));
            }

            if let (ReaderKind::Boolean, Some(transform)) = (field.reader, field.transform) {
                return Err(RelayError::schema_validation(format!(
                    "Boolean field '{}' cannot take transform '{}'",
                    field.name,
                    transform.name()
                )));
            }

            // Display ranges are advisory; a bad one only affects gauges
            let range = field.display_range;
            if range.min.is_nan() || range.max.is_nan() || range.min > range.max {
                warn!(
                    field = %field.name,
                    min = range.min,
                    max = range.max,
                    "Display range is inverted or NaN, gauges may render oddly"
                );
            }

            let end = field.end().ok_or_else(|| {
                RelayError::schema_validation(format!(
                    "Field '{}' offset {} overflows the address space",
                    field.name, field.offset
                ))
            })?;
            packet_len = packet_len.max(end);
        }

        Ok(packet_len)
    }

    /// Fields in schema order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name.as_ref() == name)
    }

    /// Highest `offset + width` over all fields: the shortest buffer that decodes.
    pub fn packet_len(&self) -> usize {
        self.packet_len
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
