//! Decoded sample snapshots

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use super::Value;

/// The fully-decoded result of one frame.
///
/// Samples are built whole by a codec and then shared read-only through
/// `Arc`, so a reader never sees a half-updated set of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Decoded values by field name; `None` marks a missing value
    pub values: HashMap<String, Option<Value>>,

    /// The frame bytes the values were decoded from (zero-copy via Arc)
    pub raw: Arc<[u8]>,

    /// When the frame was decoded
    pub captured_at: SystemTime,
}

impl Sample {
    /// Create a new sample stamped with the current time.
    pub fn new(values: HashMap<String, Option<Value>>, raw: impl Into<Arc<[u8]>>) -> Self {
        Self { values, raw: raw.into(), captured_at: SystemTime::now() }
    }

    /// Decoded value for `name`, or `None` when missing or not present.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).and_then(Option::as_ref)
    }

    /// Names with a value that could not be decoded.
    pub fn missing_fields(&self) -> impl Iterator<Item = &str> {
        self.values.iter().filter(|(_, v)| v.is_none()).map(|(k, _)| k.as_str())
    }
}
