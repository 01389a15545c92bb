//! YAML schema definitions
//!
//! Lets operators swap in a different packet layout without rebuilding:
//!
//! ```yaml
//! fields:
//!   - name: IsRaceOn
//!     offset: 0
//!     type: boolean
//!   - name: Speed
//!     offset: 256
//!     type: float32
//!     transform: mps_to_kph
//!     min: 0
//!     max: 400
//! ```
//!
//! `type` accepts the reader kind names (`boolean`, `float32`, `uint8`, `int8`,
//! `uint16`, `uint32`) as well as the Node.js buffer reader names
//! (`readFloatLE`, `readUInt16LE`, ...). `transform` names one of
//! [`Transform::BUILTINS`].

use serde::Deserialize;
use std::path::Path;
use tracing::info;

use super::TelemetrySchema;
use crate::types::{DisplayRange, FieldDescriptor, ReaderKind, Transform};
use crate::{RelayError, Result};

/// Top-level schema file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDefinition {
    pub fields: Vec<FieldDefinition>,
}

/// One field entry as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    pub name: String,
    /// Signed so that a negative offset is reported instead of failing to parse
    pub offset: i64,
    #[serde(rename = "type")]
    pub reader: ReaderKind,
    #[serde(default)]
    pub transform: Option<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl SchemaDefinition {
    /// Parse a schema definition from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| RelayError::config("schema definition", e.to_string()))
    }

    /// Read and parse a schema definition file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RelayError::io(format!("reading schema {}", path.display()), e))?;
        let definition = Self::from_yaml_str(&yaml)?;
        info!(path = %path.display(), fields = definition.fields.len(), "Loaded schema definition");
        Ok(definition)
    }

    /// Resolve names and offsets, then validate into a [`TelemetrySchema`].
    pub fn into_schema(self) -> Result<TelemetrySchema> {
        let fields =
            self.fields.into_iter().map(FieldDefinition::into_descriptor).collect::<Result<_>>()?;
        TelemetrySchema::new(fields)
    }
}

impl FieldDefinition {
    fn into_descriptor(self) -> Result<FieldDescriptor> {
        let offset = usize::try_from(self.offset).map_err(|_| {
            RelayError::schema_validation(format!(
                "Field '{}' has negative offset {}",
                self.name, self.offset
            ))
        })?;

        let defaults = DisplayRange::default();
        let mut field = FieldDescriptor::new(self.name, offset, self.reader).with_display_range(
            self.min.unwrap_or(defaults.min),
            self.max.unwrap_or(defaults.max),
        );

        if let Some(name) = self.transform {
            let transform = Transform::builtin(&name).ok_or_else(|| {
                RelayError::schema_validation(format!(
                    "Field '{}' uses unknown transform '{}'",
                    field.name, name
                ))
            })?;
            field = field.with_transform(transform);
        }

        Ok(field)
    }
}
