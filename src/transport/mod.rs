//! Byte transports.
//!
//! Both decoders sit on the same capability: deliver inbound bytes in
//! chunks, pause and resume that delivery, and write bytes back. TCP
//! sockets, serial lines and in-memory channels all implement
//! [`Transport`]; [`FrameReader`] adds "read exactly N bytes" on top for the
//! length-prefixed binary protocol.

mod channel;
mod reader;
#[cfg(feature = "serial")]
mod serial;
mod tcp;

pub use channel::{ChannelHandle, ChannelTransport};
pub use reader::FrameReader;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use bytes::Bytes;

use crate::Result;

/// A bidirectional byte stream from one device.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Wait for the next chunk of inbound bytes.
    ///
    /// Returns:
    /// - `Ok(Some(chunk))` - Bytes arrived (never empty)
    /// - `Ok(None)` - The peer closed the stream
    /// - `Err(e)` - The stream failed
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Write `data` back to the peer.
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Stop delivering inbound bytes until [`Transport::resume`].
    ///
    /// Bytes arriving meanwhile are held by the transport or the OS and
    /// delivered after resuming. Push-based transports (serial) stop their
    /// reader; pull-based ones (TCP) only record the state, since nothing
    /// is read until the session next calls [`Transport::next_chunk`].
    fn pause(&mut self);

    /// Resume inbound delivery.
    fn resume(&mut self);

    /// Whether delivery is currently paused.
    fn is_paused(&self) -> bool;

    /// Human-readable peer identity for logs.
    fn peer(&self) -> &str;
}
