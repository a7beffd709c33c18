//! Frame builders for tests and benchmarks
//!
//! Encodes values through a descriptor table so fixtures stay in step with
//! the layouts the decoders read.

#![cfg(any(test, feature = "benchmark"))]

use bytes::Bytes;

use crate::codec::solarman::{FOOTER_LEN, FrameType, HEADER_LEN, encode_frame};
use crate::types::{DescriptorTable, FieldRule, FieldType};

/// Datalogger serial number used by fixtures.
pub const TEST_SERIAL: u32 = 0x1234_5678;

/// Builds a Solarman data frame whose fields decode to chosen values.
#[derive(Debug, Clone)]
pub struct DataFrameBuilder<'a> {
    table: &'a DescriptorTable,
    frame: Vec<u8>,
}

impl<'a> DataFrameBuilder<'a> {
    /// Zero-filled frame long enough for every field in `table`.
    pub fn new(table: &'a DescriptorTable) -> Self {
        let widest_end = table
            .iter()
            .map(|field| match field.rule {
                FieldRule::Numeric { field_type, offset, .. } => offset + field_type.size(),
                FieldRule::Ascii { end, .. } | FieldRule::Raw { end, .. } => end,
                FieldRule::Capture { .. } => 0,
            })
            .max()
            .unwrap_or(HEADER_LEN)
            .max(HEADER_LEN + 1);

        Self { table, frame: vec![0; widest_end] }
    }

    /// Set a numeric field to the scaled `value`.
    ///
    /// Panics if `name` is not a numeric field of the table.
    pub fn number(mut self, name: &str, value: f64) -> Self {
        let Some(FieldRule::Numeric { field_type, offset, scale }) =
            self.table.get(name).map(|f| f.rule.clone())
        else {
            panic!("{name} is not a numeric field");
        };

        let raw = (value / scale).round();
        let slot = &mut self.frame[offset..offset + field_type.size()];
        match field_type {
            FieldType::UInt8 => slot.copy_from_slice(&(raw as u8).to_le_bytes()),
            FieldType::Int8 => slot.copy_from_slice(&(raw as i8).to_le_bytes()),
            FieldType::UInt16 => slot.copy_from_slice(&(raw as u16).to_le_bytes()),
            FieldType::Int16 => slot.copy_from_slice(&(raw as i16).to_le_bytes()),
            FieldType::UInt32 => slot.copy_from_slice(&(raw as u32).to_le_bytes()),
            FieldType::Int32 => slot.copy_from_slice(&(raw as i32).to_le_bytes()),
            FieldType::Float32 => slot.copy_from_slice(&((value / scale) as f32).to_le_bytes()),
        }
        self
    }

    /// Set an ASCII field, NUL-padded to its range.
    ///
    /// Panics if `name` is not an ASCII field or `text` does not fit.
    pub fn text(mut self, name: &str, text: &str) -> Self {
        let Some(FieldRule::Ascii { start, end }) = self.table.get(name).map(|f| f.rule.clone())
        else {
            panic!("{name} is not an ascii field");
        };
        assert!(text.len() <= end - start, "{text:?} does not fit {name}");

        self.frame[start..end].fill(0);
        self.frame[start..start + text.len()].copy_from_slice(text.as_bytes());
        self
    }

    /// Complete data frame with checksum and terminator.
    pub fn build(self, req_index: u8) -> Bytes {
        encode(FrameType::Data, req_index, &self.frame[HEADER_LEN..])
    }
}

/// Heartbeat frame as sent by an idle datalogger.
pub fn heartbeat_frame(req_index: u8) -> Bytes {
    encode(FrameType::Heartbeat, req_index, &[0x00])
}

fn encode(frame_type: FrameType, req_index: u8, payload: &[u8]) -> Bytes {
    match encode_frame(frame_type.as_byte(), 0x00, req_index, TEST_SERIAL, payload) {
        Ok(frame) => frame,
        Err(e) => panic!("fixture frame does not encode: {e}"),
    }
}

/// Minimum frame length that lets every field in `table` decode.
pub fn min_frame_len(table: &DescriptorTable) -> usize {
    table.max_offset() + FOOTER_LEN
}

/// `count` range readings split at awkward chunk boundaries.
pub fn range_chunks(count: usize) -> Vec<Bytes> {
    let text: String = (0..count).map(|i| format!("R{:03} ", 100 + i % 900)).collect();
    text.as_bytes().chunks(3).map(Bytes::copy_from_slice).collect()
}
