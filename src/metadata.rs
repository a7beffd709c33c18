//! Presentation hints for decoded fields.
//!
//! Field names carry their unit as a final `_`-separated token
//! (`dc1_V`, `generation_total_kWh`). Hosts that display values use these
//! hints; the decoders never read them.

use serde::Serialize;

/// What physical quantity a field measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Power,
    Energy,
    Voltage,
    Current,
    Temperature,
    Distance,
}

/// How successive values of a field relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    /// Instantaneous reading
    Measurement,
    /// Counter that only grows until it resets
    TotalIncreasing,
}

/// Display metadata for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMetadata {
    /// Field name as used by `get_value`
    pub key: String,
    /// Human-readable name, underscores replaced by spaces
    pub display_name: String,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: StateClass,
}

impl FieldMetadata {
    /// Derive metadata from a field name's unit suffix.
    pub fn infer(name: &str) -> Self {
        let suffix = name.rsplit('_').next().unwrap_or(name);

        let (unit, device_class) = match suffix {
            "W" => (Some("W"), Some(DeviceClass::Power)),
            "kWh" => (Some("kWh"), Some(DeviceClass::Energy)),
            "V" => (Some("V"), Some(DeviceClass::Voltage)),
            "A" => (Some("A"), Some(DeviceClass::Current)),
            "C" => (Some("°C"), Some(DeviceClass::Temperature)),
            "Hz" => (Some("Hz"), None),
            "%" => (Some("%"), None),
            _ => (None, None),
        };

        let lower = name.to_ascii_lowercase();
        let state_class = if lower.contains("total") || lower.contains("daily") {
            StateClass::TotalIncreasing
        } else {
            StateClass::Measurement
        };

        Self {
            key: name.to_string(),
            display_name: name.replace('_', " "),
            unit,
            device_class,
            state_class,
        }
    }

    /// Metadata for a range sensor reading in metres.
    pub fn for_distance(name: &str) -> Self {
        Self {
            key: name.to_string(),
            display_name: name.replace('_', " "),
            unit: Some("m"),
            device_class: Some(DeviceClass::Distance),
            state_class: StateClass::Measurement,
        }
    }
}
