//! Solarman datalogger frame codec.
//!
//! # Frame Layout
//!
//! Every frame is an 11-byte header, a payload and a 2-byte footer, all
//! little-endian and packed:
//!
//! ```text
//! offset  size  field
//!   0      1    sync (0xA5)
//!   1      2    payload length
//!   3      1    (unused)
//!   4      1    frame type
//!   5      1    response index
//!   6      1    request index
//!   7      4    datalogger serial number
//!  11      n    payload
//! 11+n     1    checksum (sum of bytes 1..11+n, mod 256)
//! 12+n     1    terminator (0x15)
//! ```
//!
//! Field descriptors address the whole frame, so a descriptor offset of 12
//! is the second payload byte.
//!
//! The datalogger expects an acknowledgement after every frame it sends,
//! including heartbeats and frame types we do not understand. Without it the
//! device stalls or drops the connection.

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::types::{DescriptorTable, FieldRule, Sample, Value};
use crate::{Result, SensorError};

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 11;
/// Checksum byte plus terminator byte.
pub const FOOTER_LEN: usize = 2;
/// Leading sync marker.
pub const SYNC_BYTE: u8 = 0xA5;
/// Trailing terminator.
pub const TERMINATOR: u8 = 0x15;

const HEARTBEAT_TYPE: u8 = 0x41;
const DATA_TYPE: u8 = 0x42;
const RESPONSE_TYPE_OFFSET: u8 = 0x30;
const ACK_PAYLOAD_LEN: usize = 10;
const ACK_MARKER: u8 = 0xAA;

/// Classification of a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Keep-alive, carries no measurements
    Heartbeat,
    /// Inverter data
    Data,
    /// Anything else; acknowledged and otherwise ignored
    Unknown(u8),
}

impl FrameType {
    /// Classify a raw type byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            HEARTBEAT_TYPE => FrameType::Heartbeat,
            DATA_TYPE => FrameType::Data,
            other => FrameType::Unknown(other),
        }
    }

    /// Raw type byte.
    pub fn as_byte(self) -> u8 {
        match self {
            FrameType::Heartbeat => HEARTBEAT_TYPE,
            FrameType::Data => DATA_TYPE,
            FrameType::Unknown(other) => other,
        }
    }

    /// Type byte of the acknowledgement for this frame type.
    pub fn response_byte(self) -> u8 {
        self.as_byte().wrapping_sub(RESPONSE_TYPE_OFFSET)
    }
}

/// Parsed 11-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length, excluding header and footer
    pub payload_length: u16,
    /// Raw frame type byte
    pub frame_type: u8,
    /// Response sequence index
    pub resp_index: u8,
    /// Request sequence index
    pub req_index: u8,
    /// Datalogger serial number
    pub serial_no: u32,
}

impl FrameHeader {
    /// Parse the first 11 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let Some(header) = bytes.get(..HEADER_LEN) else {
            return Err(SensorError::ShortRead { expected: HEADER_LEN, received: bytes.len() });
        };

        if header[0] != SYNC_BYTE {
            warn!(sync = header[0], "Unexpected sync byte in frame header");
        }

        Ok(Self {
            payload_length: u16::from_le_bytes([header[1], header[2]]),
            frame_type: header[4],
            resp_index: header[5],
            req_index: header[6],
            serial_no: u32::from_le_bytes([header[7], header[8], header[9], header[10]]),
        })
    }

    /// Classified frame type.
    pub fn kind(&self) -> FrameType {
        FrameType::from_byte(self.frame_type)
    }

    /// Bytes following the header: payload plus footer.
    pub fn body_len(&self) -> usize {
        usize::from(self.payload_length) + FOOTER_LEN
    }

    /// Append the wire form of this header to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(SYNC_BYTE);
        buf.put_u16_le(self.payload_length);
        buf.put_u8(0x00);
        buf.put_u8(self.frame_type);
        buf.put_u8(self.resp_index);
        buf.put_u8(self.req_index);
        buf.put_u32_le(self.serial_no);
    }
}

/// Additive 8-bit checksum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Check the footer checksum of a complete frame.
///
/// Returns `false` for frames too short to carry a footer.
pub fn verify_checksum(frame: &[u8]) -> bool {
    if frame.len() < HEADER_LEN + FOOTER_LEN {
        return false;
    }
    let checksum_at = frame.len() - FOOTER_LEN;
    checksum(&frame[1..checksum_at]) == frame[checksum_at]
}

/// Encode a complete frame with a correct checksum and terminator.
pub fn encode_frame(
    frame_type: u8,
    resp_index: u8,
    req_index: u8,
    serial_no: u32,
    payload: &[u8],
) -> Result<Bytes> {
    let payload_length = u16::try_from(payload.len()).map_err(|_| {
        SensorError::config_error(
            "Frame encoding",
            format!("payload of {} bytes exceeds u16 length field", payload.len()),
        )
    })?;

    let header = FrameHeader { payload_length, frame_type, resp_index, req_index, serial_no };
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len() + FOOTER_LEN);
    header.encode_into(&mut buf);
    buf.put_slice(payload);
    buf.put_u8(checksum(&buf[1..]));
    buf.put_u8(TERMINATOR);

    Ok(buf.freeze())
}

/// One complete received frame: header plus payload and footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolarmanFrame {
    /// Parsed header
    pub header: FrameHeader,
    /// Every byte of the frame, header included
    pub bytes: Bytes,
}

impl SolarmanFrame {
    /// Join a parsed header with the body read after it.
    pub fn new(header: FrameHeader, header_bytes: &[u8], body: &[u8]) -> Self {
        let mut bytes = BytesMut::with_capacity(header_bytes.len() + body.len());
        bytes.put_slice(header_bytes);
        bytes.put_slice(body);
        Self { header, bytes: bytes.freeze() }
    }

    /// Parse a frame from a contiguous buffer.
    pub fn parse(bytes: Bytes) -> Result<Self> {
        let header = FrameHeader::parse(&bytes)?;
        let expected = HEADER_LEN + header.body_len();
        if bytes.len() < expected {
            return Err(SensorError::ShortRead { expected, received: bytes.len() });
        }
        Ok(Self { header, bytes: bytes.slice(..expected) })
    }

    /// Payload plus footer.
    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_LEN.min(self.bytes.len())..]
    }
}

/// The response frame the datalogger waits for after each frame it sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    header: FrameHeader,
    payload: [u8; ACK_PAYLOAD_LEN],
}

impl Acknowledgement {
    /// Build the acknowledgement for `request`.
    ///
    /// The first payload byte echoes the first byte after the request header.
    pub fn for_frame(request: &SolarmanFrame, unix_time: u32) -> Self {
        let echo = request.body().first().copied().unwrap_or(0);
        let time = unix_time.to_le_bytes();
        let payload =
            [echo, 0x01, time[0], time[1], time[2], time[3], ACK_MARKER, ACK_MARKER, 0x00, 0x00];

        let header = FrameHeader {
            payload_length: ACK_PAYLOAD_LEN as u16,
            frame_type: request.header.kind().response_byte(),
            resp_index: request.header.req_index,
            req_index: request.header.req_index,
            serial_no: request.header.serial_no,
        };

        Self { header, payload }
    }

    /// Wire bytes of the acknowledgement.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + ACK_PAYLOAD_LEN + FOOTER_LEN);
        self.header.encode_into(&mut buf);
        buf.put_slice(&self.payload);
        buf.put_u8(checksum(&buf[1..]));
        buf.put_u8(TERMINATOR);
        buf.freeze()
    }
}

/// Decodes data frames against a descriptor table.
#[derive(Debug, Clone)]
pub struct SolarmanDecoder {
    table: Arc<DescriptorTable>,
}

impl SolarmanDecoder {
    /// Create a decoder; every rule in `table` must address frame bytes.
    pub fn new(table: Arc<DescriptorTable>) -> Result<Self> {
        table.require_binary()?;
        debug!(
            fields = table.len(),
            min_frame_len = table.max_offset() + FOOTER_LEN,
            "Solarman decoder ready"
        );
        Ok(Self { table })
    }

    /// Descriptor table this decoder reads.
    pub fn table(&self) -> &Arc<DescriptorTable> {
        &self.table
    }

    /// Decode a frame into a sample.
    ///
    /// Only data frames produce a sample; heartbeats and unknown frames
    /// return `None`.
    pub fn decode(&self, frame: &SolarmanFrame) -> Option<Sample> {
        match frame.header.kind() {
            FrameType::Data => {
                if !verify_checksum(&frame.bytes) {
                    debug!(serial_no = frame.header.serial_no, "Data frame checksum mismatch");
                }
                let values = self.decode_fields(&frame.bytes);
                Some(Sample::new(values, frame.bytes.to_vec()))
            }
            FrameType::Heartbeat => {
                debug!(serial_no = frame.header.serial_no, "Received heartbeat frame");
                None
            }
            FrameType::Unknown(frame_type) => {
                warn!(frame_type, header = ?frame.header, "Unknown frame type");
                None
            }
        }
    }

    /// Extract every described field from a complete message.
    ///
    /// A field that starts within the last two bytes of the message (or
    /// would read past its end) is reported as missing; the remaining fields
    /// are still decoded.
    pub fn decode_fields(&self, message: &[u8]) -> HashMap<String, Option<Value>> {
        let limit = message.len().saturating_sub(FOOTER_LEN);
        let mut values = HashMap::with_capacity(self.table.len());

        for field in self.table.iter() {
            let value = match field.rule.start_offset() {
                Some(start) if start > limit || message.len() < FOOTER_LEN => {
                    warn!(
                        field = %field.name,
                        offset = start,
                        message_len = message.len(),
                        "Unable to extract field, message too short"
                    );
                    None
                }
                _ => extract(&field.rule, message),
            };

            trace!(field = %field.name, ?value, "Extracted field");
            values.insert(field.name.clone(), value);
        }

        values
    }
}

fn extract(rule: &FieldRule, message: &[u8]) -> Option<Value> {
    match *rule {
        FieldRule::Numeric { field_type, offset, scale } => {
            field_type.read(message, offset).map(|raw| Value::Number(raw * scale))
        }
        FieldRule::Ascii { start, end } => {
            let bytes = message.get(start..end.min(message.len()))?;
            if !bytes.is_ascii() {
                warn!(start, end, "Non-ASCII bytes in text field");
                return None;
            }
            let text = String::from_utf8_lossy(bytes);
            let trimmed = text.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
            Some(Value::Text(trimmed.to_string()))
        }
        FieldRule::Raw { start, end } => {
            message.get(start..end.min(message.len())).map(|b| Value::Bytes(b.to_vec()))
        }
        FieldRule::Capture { .. } => None,
    }
}
