//! Core types for describing and holding decoded telemetry.
//!
//! ## Architecture
//!
//! - [`ReaderKind`] is the closed set of primitive readers with their byte widths
//! - [`FieldDescriptor`] places one reader at a fixed offset, with an optional [`Transform`]
//! - [`Value`] is one decoded primitive, [`Reading`] the name-keyed result for a packet
//!
//! ## Usage Example
//!
//! ```rust
//! use telemetry_relay::types::{FieldDescriptor, ReaderKind, Transform, Value};
//!
//! let boost = FieldDescriptor::new("Boost", 0, ReaderKind::Float32)
//!     .with_transform(Transform::PSI_TO_BAR);
//!
//! let data = 29.008f32.to_le_bytes();
//! let value = boost.read(&data).unwrap();
//! assert!((value.as_f64().unwrap() - 2.0).abs() < 1e-6);
//! ```

mod field;
mod reader_kind;
mod reading;
mod transform;
mod value;

pub use field::{DisplayRange, FieldDescriptor};
pub use reader_kind::ReaderKind;
pub use reading::Reading;
pub use transform::Transform;
pub use value::Value;
