//! Built-in descriptor tables.

use crate::types::{DescriptorTable, FieldDescriptor, FieldType};
use crate::Result;

/// Field layout of a Solis 4G inverter data frame as relayed by its
/// Solarman datalogger.
///
/// Offsets address the whole frame (header included). Names end in a unit
/// suffix so [`FieldMetadata::infer`](crate::metadata::FieldMetadata::infer)
/// can classify them.
pub fn solis_inverter_fields() -> Vec<FieldDescriptor> {
    use FieldType::{UInt16, UInt32};

    vec![
        FieldDescriptor::ascii("inverter_serial", 32, 48),
        FieldDescriptor::numeric("inverter_temperature_C", UInt16, 48, 0.1),
        FieldDescriptor::numeric("dc1_V", UInt16, 50, 0.1),
        FieldDescriptor::numeric("dc2_V", UInt16, 52, 0.1),
        FieldDescriptor::numeric("dc1_A", UInt16, 54, 0.1),
        FieldDescriptor::numeric("dc2_A", UInt16, 56, 0.1),
        FieldDescriptor::numeric("ac1_A", UInt16, 58, 0.1),
        FieldDescriptor::numeric("ac2_A", UInt16, 60, 0.1),
        FieldDescriptor::numeric("ac3_A", UInt16, 62, 0.1),
        FieldDescriptor::numeric("ac1_V", UInt16, 64, 0.1),
        FieldDescriptor::numeric("ac2_V", UInt16, 66, 0.1),
        FieldDescriptor::numeric("ac3_V", UInt16, 68, 0.1),
        FieldDescriptor::numeric("ac_Hz", UInt16, 70, 0.01),
        FieldDescriptor::numeric("ac_output_W", UInt32, 72, 1.0),
        FieldDescriptor::numeric("generation_daily_kWh", UInt16, 76, 0.01),
        FieldDescriptor::numeric("generation_total_kWh", UInt32, 80, 0.1),
    ]
}

/// [`solis_inverter_fields`] as a validated table.
pub fn solis_inverter_table() -> Result<DescriptorTable> {
    DescriptorTable::new(solis_inverter_fields())
}
