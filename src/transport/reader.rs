//! Exact-length reads over chunked transports

use bytes::{Bytes, BytesMut};
use tracing::trace;

use super::Transport;
use crate::{Result, SensorError};

/// Buffers chunks from a transport to serve exact-length reads.
#[derive(Debug)]
pub struct FrameReader<T> {
    transport: T,
    buffer: BytesMut,
}

impl<T: Transport> FrameReader<T> {
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        Self { transport, buffer: BytesMut::with_capacity(1024) }
    }

    /// Read exactly `len` bytes.
    ///
    /// Returns `Ok(None)` if the stream closed cleanly before any byte of
    /// this read arrived, and [`SensorError::ShortRead`] if it closed part
    /// way through. Cancelling the returned future loses no bytes.
    pub async fn read_exact(&mut self, len: usize) -> Result<Option<Bytes>> {
        while self.buffer.len() < len {
            match self.transport.next_chunk().await? {
                Some(chunk) => {
                    trace!(peer = self.transport.peer(), len = chunk.len(), "Received chunk");
                    self.buffer.extend_from_slice(&chunk);
                }
                None if self.buffer.is_empty() => return Ok(None),
                None => {
                    return Err(SensorError::ShortRead {
                        expected: len,
                        received: self.buffer.len(),
                    });
                }
            }
        }

        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    /// Bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The wrapped transport, mutably (for writes).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;

    #[tokio::test]
    async fn reads_span_chunk_boundaries() {
        let (transport, handle) = ChannelTransport::pair("test", 8);
        let mut reader = FrameReader::new(transport);

        handle.inbound.send(Bytes::from_static(b"abc")).await.unwrap();
        handle.inbound.send(Bytes::from_static(b"defg")).await.unwrap();

        assert_eq!(reader.read_exact(5).await.unwrap().unwrap().as_ref(), b"abcde");
        assert_eq!(reader.buffered(), 2);
        assert_eq!(reader.read_exact(2).await.unwrap().unwrap().as_ref(), b"fg");
    }

    #[tokio::test]
    async fn clean_close_before_read_is_none() {
        let (transport, handle) = ChannelTransport::pair("test", 8);
        let mut reader = FrameReader::new(transport);
        drop(handle);

        assert!(reader.read_exact(11).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_mid_read_is_short_read() {
        let (transport, handle) = ChannelTransport::pair("test", 8);
        let mut reader = FrameReader::new(transport);

        handle.inbound.send(Bytes::from_static(b"\xa5\x01")).await.unwrap();
        drop(handle);

        let result = reader.read_exact(11).await;
        assert!(matches!(result, Err(SensorError::ShortRead { expected: 11, received: 2 })));
    }
}
