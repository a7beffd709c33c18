//! Core types for decoded measurement data.
//!
//! - [`DescriptorTable`] is the static vocabulary of a decoder: field name to
//!   [`FieldRule`], with O(1) lookup by name
//! - [`FieldType`] maps little-endian wire types to their sizes
//! - [`Value`] is one decoded field, [`Sample`] a whole decoded frame
//!
//! ## Usage Example
//!
//! ```rust
//! use sensorwire::types::{DescriptorTable, FieldDescriptor, FieldRule, FieldType};
//!
//! let table = DescriptorTable::new(vec![
//!     FieldDescriptor::numeric("volts", FieldType::UInt16, 12, 0.1),
//! ]).unwrap();
//!
//! let mut frame = vec![0u8; 16];
//! frame[12..14].copy_from_slice(&550u16.to_le_bytes());
//!
//! if let Some(FieldRule::Numeric { field_type, offset, scale }) =
//!     table.get("volts").map(|f| &f.rule)
//! {
//!     let volts = field_type.read(&frame, *offset).unwrap() * scale;
//!     assert!((volts - 55.0).abs() < 1e-9);
//! }
//! ```

mod descriptor;
mod field_type;
mod sample;
mod update_rate;
mod value;

pub use descriptor::{DescriptorTable, FieldDescriptor, FieldKind, FieldRule};
pub use field_type::FieldType;
pub use sample::Sample;
pub use update_rate::UpdateRate;
pub use value::Value;
