//! In-memory transport backed by tokio channels

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

use super::Transport;
use crate::{Result, SensorError};

/// Transport fed from a channel.
///
/// Useful when the host already owns the device connection, and for
/// driving sessions in tests.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::Receiver<Bytes>,
    outbound: mpsc::UnboundedSender<Bytes>,
    paused: Arc<AtomicBool>,
    pauses: Arc<AtomicUsize>,
    peer: String,
}

/// The far end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelHandle {
    /// Send bytes to the session; dropping it closes the stream
    pub inbound: mpsc::Sender<Bytes>,
    /// Bytes the session wrote back
    pub outbound: mpsc::UnboundedReceiver<Bytes>,
    paused: Arc<AtomicBool>,
    pauses: Arc<AtomicUsize>,
}

impl ChannelHandle {
    /// Whether the session currently has delivery paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// How many times the session paused delivery.
    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::Acquire)
    }
}

impl ChannelTransport {
    /// Create a transport and its handle; `capacity` bounds queued chunks.
    pub fn pair(peer: impl Into<String>, capacity: usize) -> (Self, ChannelHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let paused = Arc::new(AtomicBool::new(false));
        let pauses = Arc::new(AtomicUsize::new(0));

        let transport = Self {
            inbound: inbound_rx,
            outbound: outbound_tx,
            paused: Arc::clone(&paused),
            pauses: Arc::clone(&pauses),
            peer: peer.into(),
        };
        let handle =
            ChannelHandle { inbound: inbound_tx, outbound: outbound_rx, paused, pauses };

        (transport, handle)
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.inbound.recv().await {
                Some(chunk) if chunk.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.outbound
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| SensorError::connection_failed(format!("{} stopped reading", self.peer)))
    }

    fn pause(&mut self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            self.pauses.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn resume(&mut self) {
        self.paused.store(false, Ordering::Release);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}
