//! Text frame codec for ranging sensors.
//!
//! MaxSonar-class sensors print readings as free text, e.g. `R0423\r`.
//! Nothing marks where a reading starts or ends on the wire, and the serial
//! driver hands over bytes in whatever chunks it likes, so the decoder keeps
//! every byte it has seen until the pattern matches.

use bytes::{Buf, BytesMut};
use regex::bytes::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::types::{DescriptorTable, FieldRule, Sample, Value};
use crate::{Result, SensorError};

/// Pattern used when none is configured: `R`, digits, whitespace.
pub const DEFAULT_PATTERN: &str = r"R(\d+)\s";
/// Field name used when none is configured.
pub const DEFAULT_FIELD: &str = "distance";
/// Buffer size past which the oldest unmatched bytes are dropped.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 4096;

/// Incremental decoder for pattern-delimited text frames.
#[derive(Debug)]
pub struct RangeFrameDecoder {
    pattern: Regex,
    table: Arc<DescriptorTable>,
    buffer: BytesMut,
    max_buffer_len: usize,
}

impl RangeFrameDecoder {
    /// Create a decoder from a pattern and a capture table.
    pub fn new(pattern: &str, table: Arc<DescriptorTable>) -> Result<Self> {
        table.require_captures()?;
        let pattern =
            Regex::new(pattern).map_err(|source| SensorError::invalid_pattern(pattern, source))?;

        let groups = pattern.captures_len() - 1;
        if groups > table.len() {
            warn!(
                groups,
                fields = table.len(),
                "Pattern has more capture groups than field names; every match will fail"
            );
        }

        Ok(Self { pattern, table, buffer: BytesMut::new(), max_buffer_len: DEFAULT_MAX_BUFFER_LEN })
    }

    /// Decoder for the default `R(\d+)\s` pattern and `distance` field.
    pub fn with_defaults() -> Result<Self> {
        let table = DescriptorTable::from_capture_names([DEFAULT_FIELD])?;
        Self::new(DEFAULT_PATTERN, Arc::new(table))
    }

    /// Cap the number of unmatched bytes kept between chunks.
    pub fn with_max_buffer_len(mut self, max_buffer_len: usize) -> Self {
        self.max_buffer_len = max_buffer_len.max(1);
        self
    }

    /// Descriptor table this decoder fills.
    pub fn table(&self) -> &Arc<DescriptorTable> {
        &self.table
    }

    /// Bytes accumulated since the last match.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Append a chunk and try to extract a frame.
    ///
    /// Returns `Ok(None)` while no complete frame is buffered. When the
    /// buffer holds several frames, the last one wins. The buffer is cleared
    /// on every match, including matches that fail with
    /// [`SensorError::TooManyCapturedValues`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Sample>> {
        self.buffer.extend_from_slice(chunk);
        trace!(chunk_len = chunk.len(), buffered = self.buffer.len(), "Appended chunk");

        let matched = self.pattern.captures_iter(&self.buffer).last().map(|captures| {
            let raw = captures.get(0).map(|m| m.as_bytes().to_vec()).unwrap_or_default();
            let groups: Vec<Option<Vec<u8>>> =
                captures.iter().skip(1).map(|m| m.map(|m| m.as_bytes().to_vec())).collect();
            (raw, groups)
        });

        let Some((raw, groups)) = matched else {
            self.enforce_limit();
            return Ok(None);
        };
        self.buffer.clear();

        if groups.len() > self.table.len() {
            return Err(SensorError::TooManyCapturedValues {
                captured: groups.len(),
                declared: self.table.len(),
            });
        }

        let mut values = HashMap::with_capacity(self.table.len());
        for field in self.table.iter() {
            let value = match field.rule {
                FieldRule::Capture { group } => groups
                    .get(group - 1)
                    .and_then(Option::as_ref)
                    .map(|bytes| Value::Text(String::from_utf8_lossy(bytes).into_owned())),
                _ => None,
            };
            values.insert(field.name.clone(), value);
        }

        debug!(?values, "Decoded text frame");
        Ok(Some(Sample::new(values, raw)))
    }

    /// Drop the oldest bytes once the buffer outgrows its limit.
    fn enforce_limit(&mut self) {
        if self.buffer.len() > self.max_buffer_len {
            let excess = self.buffer.len() - self.max_buffer_len;
            warn!(dropped = excess, "No frame matched; discarding oldest buffered bytes");
            self.buffer.advance(excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(sample: &Sample, name: &str) -> Option<String> {
        sample.value(name).and_then(Value::as_str).map(str::to_string)
    }

    #[test]
    fn single_chunk_reading_decodes() {
        let mut decoder = RangeFrameDecoder::with_defaults().unwrap();

        let sample = decoder.push(b"R042 ").unwrap().unwrap();
        assert_eq!(value(&sample, "distance").as_deref(), Some("042"));
        assert_eq!(sample.raw.as_ref(), b"R042 ");
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn reading_split_across_chunks_is_reassembled() {
        let mut decoder = RangeFrameDecoder::with_defaults().unwrap();

        assert!(decoder.push(b"R12").unwrap().is_none());
        assert_eq!(decoder.buffered(), b"R12");

        let sample = decoder.push(b"3 ").unwrap().unwrap();
        assert_eq!(value(&sample, "distance").as_deref(), Some("123"));
    }

    #[test]
    fn last_match_wins() {
        let mut decoder = RangeFrameDecoder::with_defaults().unwrap();

        let sample = decoder.push(b"R100\rR200\rR30").unwrap().unwrap();
        assert_eq!(value(&sample, "distance").as_deref(), Some("200"));
        // The trailing partial reading is discarded with the rest of the window
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn unmatched_garbage_is_kept() {
        let mut decoder = RangeFrameDecoder::with_defaults().unwrap();

        assert!(decoder.push(b"\x00\xffnoise").unwrap().is_none());
        assert_eq!(decoder.buffered(), b"\x00\xffnoise");
    }

    #[test]
    fn too_many_groups_fails_and_clears_buffer() {
        let table = DescriptorTable::from_capture_names(["distance"]).unwrap();
        let mut decoder = RangeFrameDecoder::new(r"R(\d+)([a-z]+)\s", Arc::new(table)).unwrap();

        let result = decoder.push(b"R42cm ");
        assert!(matches!(
            result,
            Err(SensorError::TooManyCapturedValues { captured: 2, declared: 1 })
        ));
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn extra_names_are_missing() {
        let table = DescriptorTable::from_capture_names(["distance", "unit"]).unwrap();
        let mut decoder = RangeFrameDecoder::new(r"R(\d+)\s", Arc::new(table)).unwrap();

        let sample = decoder.push(b"R7 ").unwrap().unwrap();
        assert_eq!(value(&sample, "distance").as_deref(), Some("7"));
        assert_eq!(sample.values.get("unit"), Some(&None));
    }

    #[test]
    fn oversized_buffer_keeps_newest_bytes() {
        let mut decoder = RangeFrameDecoder::with_defaults().unwrap().with_max_buffer_len(4);

        assert!(decoder.push(b"xxxxxxR1").unwrap().is_none());
        assert_eq!(decoder.buffered(), b"xxR1");

        let sample = decoder.push(b"5 ").unwrap().unwrap();
        assert_eq!(value(&sample, "distance").as_deref(), Some("15"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let table = DescriptorTable::from_capture_names(["distance"]).unwrap();
        let result = RangeFrameDecoder::new(r"R(\d+", Arc::new(table));
        assert!(matches!(result, Err(SensorError::Pattern { .. })));
    }
}
