//! Binary packet decoder
//!
//! [`decode`] is pure: the same buffer and schema always yield the same
//! [`Reading`]. The only failure is a buffer shorter than the schema's
//! [`packet_len`](TelemetrySchema::packet_len), which is checked up front so a
//! partially populated reading can never escape.

use tracing::trace;

use crate::schema::TelemetrySchema;
use crate::types::Reading;
use crate::{RelayError, Result};

/// Decode one packet against `schema`.
///
/// Bytes past the last field are ignored. Values are not range-checked; NaN and
/// infinities pass through untouched.
///
/// ```rust
/// use telemetry_relay::decoder::decode;
/// use telemetry_relay::schema::TelemetrySchema;
/// use telemetry_relay::types::{FieldDescriptor, ReaderKind, Value};
///
/// let schema = TelemetrySchema::new(vec![FieldDescriptor::new("Speed", 0, ReaderKind::Float32)])?;
/// let reading = decode(&27.5f32.to_le_bytes(), &schema)?;
/// assert_eq!(reading.get("Speed"), Some(Value::Float32(27.5)));
/// # Ok::<(), telemetry_relay::RelayError>(())
/// ```
pub fn decode(buffer: &[u8], schema: &TelemetrySchema) -> Result<Reading> {
    let required = schema.packet_len();
    if buffer.len() < required {
        return Err(RelayError::buffer_too_short(required, buffer.len()));
    }

    let mut reading = Reading::with_capacity(schema.len());
    for field in schema.fields() {
        let value = field.read(buffer)?;
        reading.push(field.name.clone(), value);
    }

    trace!(fields = reading.len(), bytes = buffer.len(), "Decoded packet");
    Ok(reading)
}
