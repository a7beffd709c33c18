//! Decoded measurement values

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single decoded field value.
///
/// Scaled binary numerics are always carried as `f64`; the text codec
/// keeps captured groups verbatim so leading zeros survive (`"042"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Scaled numeric value
    Number(f64),
    /// Trimmed text (ascii binary fields and captured groups)
    Text(String),
    /// Raw bytes sliced out of a frame
    Bytes(Vec<u8>),
}

impl Value {
    /// Numeric view of this value.
    ///
    /// Text is parsed so captured digits can be used as numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Bytes(_) => None,
        }
    }

    /// Text view of this value, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Byte view of this value, if it is a raw slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}
