//! Wire types for numeric fields

use serde::{Deserialize, Serialize};

/// Little-endian numeric types a binary field can be stored as.
///
/// Config files may use either the lowercase Rust-style name (`u16`) or the
/// packed struct format code used by datalogger field tables (`<H`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    #[serde(rename = "u8", alias = "<B", alias = "B")]
    UInt8,
    /// Signed 8-bit integer
    #[serde(rename = "i8", alias = "<b", alias = "b")]
    Int8,
    /// Unsigned 16-bit integer
    #[serde(rename = "u16", alias = "<H")]
    UInt16,
    /// Signed 16-bit integer
    #[serde(rename = "i16", alias = "<h")]
    Int16,
    /// Unsigned 32-bit integer
    #[serde(rename = "u32", alias = "<I")]
    UInt32,
    /// Signed 32-bit integer
    #[serde(rename = "i32", alias = "<i")]
    Int32,
    /// IEEE-754 single precision float
    #[serde(rename = "f32", alias = "<f")]
    Float32,
}

impl FieldType {
    /// Returns the size in bytes of this data type.
    pub const fn size(&self) -> usize {
        match self {
            FieldType::UInt8 | FieldType::Int8 => 1,
            FieldType::UInt16 | FieldType::Int16 => 2,
            FieldType::UInt32 | FieldType::Int32 | FieldType::Float32 => 4,
        }
    }

    /// Whether the stored value is an integer (fixed-point once scaled).
    pub const fn is_integer(&self) -> bool {
        !matches!(self, FieldType::Float32)
    }

    /// Read the unscaled value at `offset`.
    ///
    /// Returns `None` when the value would extend past the end of `data`.
    pub fn read(&self, data: &[u8], offset: usize) -> Option<f64> {
        let bytes = data.get(offset..offset.checked_add(self.size())?)?;

        let value = match self {
            FieldType::UInt8 => f64::from(bytes[0]),
            FieldType::Int8 => f64::from(bytes[0] as i8),
            FieldType::UInt16 => f64::from(u16::from_le_bytes([bytes[0], bytes[1]])),
            FieldType::Int16 => f64::from(i16::from_le_bytes([bytes[0], bytes[1]])),
            FieldType::UInt32 => {
                f64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            FieldType::Int32 => {
                f64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            FieldType::Float32 => {
                f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
        };

        Some(value)
    }
}
