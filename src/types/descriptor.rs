//! Field descriptor tables

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::FieldType;
use crate::{Result, SensorError};

/// How one named value is located inside a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldRule {
    /// Little-endian number at `offset`, multiplied by `scale`
    Numeric {
        #[serde(rename = "type")]
        field_type: FieldType,
        offset: usize,
        #[serde(default = "default_scale")]
        scale: f64,
    },
    /// ASCII text in `[start, end)`, trailing whitespace and NULs trimmed
    Ascii { start: usize, end: usize },
    /// Bytes in `[start, end)` kept verbatim
    Raw { start: usize, end: usize },
    /// 1-based capture group of the text frame pattern
    Capture { group: usize },
}

fn default_scale() -> f64 {
    1.0
}

/// Coarse classification of a field rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Scaled integer
    FixedPoint,
    /// Scaled float
    Float,
    /// Text slice or captured group
    AsciiString,
    /// Raw byte slice
    Raw,
}

impl FieldRule {
    /// Classification of this rule.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldRule::Numeric { field_type, .. } if field_type.is_integer() => {
                FieldKind::FixedPoint
            }
            FieldRule::Numeric { .. } => FieldKind::Float,
            FieldRule::Ascii { .. } | FieldRule::Capture { .. } => FieldKind::AsciiString,
            FieldRule::Raw { .. } => FieldKind::Raw,
        }
    }

    /// First byte position the rule reads, for binary rules.
    pub fn start_offset(&self) -> Option<usize> {
        match self {
            FieldRule::Numeric { offset, .. } => Some(*offset),
            FieldRule::Ascii { start, .. } | FieldRule::Raw { start, .. } => Some(*start),
            FieldRule::Capture { .. } => None,
        }
    }

    /// Whether the rule addresses bytes of a binary frame.
    pub fn is_binary(&self) -> bool {
        !matches!(self, FieldRule::Capture { .. })
    }
}

/// Static rule describing how to locate and scale one named value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Public field name
    pub name: String,
    /// Location and interpretation of the value
    #[serde(flatten)]
    pub rule: FieldRule,
}

impl FieldDescriptor {
    /// Scaled numeric field.
    pub fn numeric(name: impl Into<String>, field_type: FieldType, offset: usize, scale: f64) -> Self {
        Self { name: name.into(), rule: FieldRule::Numeric { field_type, offset, scale } }
    }

    /// ASCII text field covering `[start, end)`.
    pub fn ascii(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self { name: name.into(), rule: FieldRule::Ascii { start, end } }
    }

    /// Raw byte field covering `[start, end)`.
    pub fn raw(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self { name: name.into(), rule: FieldRule::Raw { start, end } }
    }

    /// Text codec field bound to a 1-based capture group.
    pub fn capture(name: impl Into<String>, group: usize) -> Self {
        Self { name: name.into(), rule: FieldRule::Capture { group } }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SensorError::invalid_descriptor("<empty>", "field name is empty"));
        }

        match self.rule {
            FieldRule::Numeric { scale, .. } if !scale.is_finite() || scale == 0.0 => {
                Err(SensorError::invalid_descriptor(
                    &self.name,
                    format!("scale must be finite and non-zero, got {scale}"),
                ))
            }
            FieldRule::Ascii { start, end } | FieldRule::Raw { start, end } if end < start => {
                Err(SensorError::invalid_descriptor(
                    &self.name,
                    format!("range end {end} is before start {start}"),
                ))
            }
            FieldRule::Capture { group: 0 } => Err(SensorError::invalid_descriptor(
                &self.name,
                "capture groups are numbered from 1",
            )),
            _ => Ok(()),
        }
    }
}

/// Immutable table of field descriptors, the public vocabulary of a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorTable {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl DescriptorTable {
    /// Build a table, rejecting duplicate names and malformed rules.
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(fields.len());

        for (position, field) in fields.iter().enumerate() {
            field.validate()?;
            if index.insert(field.name.clone(), position).is_some() {
                return Err(SensorError::invalid_descriptor(&field.name, "duplicate field name"));
            }
        }

        Ok(Self { fields, index })
    }

    /// Text codec table mapping capture group `i + 1` to `names[i]`.
    pub fn from_capture_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| FieldDescriptor::capture(name, i + 1))
            .collect();
        Self::new(fields)
    }

    /// Check that every rule addresses binary frame bytes.
    pub fn require_binary(&self) -> Result<()> {
        match self.fields.iter().find(|f| !f.rule.is_binary()) {
            Some(field) => Err(SensorError::invalid_descriptor(
                &field.name,
                "capture rules cannot be used with binary frames",
            )),
            None => Ok(()),
        }
    }

    /// Check that every rule is a capture group.
    pub fn require_captures(&self) -> Result<()> {
        match self.fields.iter().find(|f| f.rule.is_binary()) {
            Some(field) => Err(SensorError::invalid_descriptor(
                &field.name,
                "text frames only support capture rules",
            )),
            None => Ok(()),
        }
    }

    /// Get a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Check if a name is part of the vocabulary.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared names in table order.
    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Iterate descriptors in table order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the table declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Highest start offset of any binary rule (0 for text tables).
    pub fn max_offset(&self) -> usize {
        self.fields.iter().filter_map(|f| f.rule.start_offset()).max().unwrap_or(0)
    }
}
