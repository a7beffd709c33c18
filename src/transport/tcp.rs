//! TCP transport

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use super::Transport;
use crate::Result;

const READ_CAPACITY: usize = 4096;

/// One accepted TCP connection.
///
/// TCP is pull-based: [`Transport::pause`] only records the state. The
/// session does not call `next_chunk` while a chunk is being processed, so
/// unread bytes stay in the kernel's receive buffer and its window pushes
/// back on the sender.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    buffer: BytesMut,
    paused: bool,
    peer: String,
}

impl TcpTransport {
    /// Wrap an accepted stream.
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        Self { stream, buffer: BytesMut::with_capacity(READ_CAPACITY), paused: false, peer }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.buffer.reserve(READ_CAPACITY);
        let read = self.stream.read_buf(&mut self.buffer).await?;
        if read == 0 {
            return Ok(None);
        }

        trace!(peer = %self.peer, read, "TCP read");
        Ok(Some(self.buffer.split().freeze()))
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}
