//! Serial line transport

use bytes::Bytes;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Transport;
use crate::{Result, SensorError};

const READ_CHUNK: usize = 256;
const PAUSED_POLL: Duration = Duration::from_millis(5);
const QUEUED_CHUNKS: usize = 32;

/// Serial port read by a dedicated blocking thread.
///
/// Pausing stops the reader thread from draining the port, so bytes queue up
/// in the driver and arrive together after resuming.
pub struct SerialTransport {
    chunks: mpsc::Receiver<Bytes>,
    writer: Arc<Mutex<Box<dyn SerialPort>>>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    peer: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("peer", &self.peer)
            .field("paused", &self.paused.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open `path` at 8N1 with no flow control.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyAMA0")
    /// * `baud_rate` - Baud rate (e.g., 9600)
    /// * `timeout` - Per-read timeout; bounds how quickly the reader notices shutdown
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let serial_error = |source| SensorError::Serial { port: path.to_string(), source };

        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(serial_error)?;
        let reader = port.try_clone().map_err(serial_error)?;

        info!(port = path, baud_rate, "Opened serial port");

        let (tx, chunks) = mpsc::channel(QUEUED_CHUNKS);
        let paused = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        {
            let paused = Arc::clone(&paused);
            let shutdown = Arc::clone(&shutdown);
            let name = path.to_string();
            thread::Builder::new()
                .name(format!("serial-reader {path}"))
                .spawn(move || reader_loop(reader, tx, paused, shutdown, name))?;
        }

        Ok(Self {
            chunks,
            writer: Arc::new(Mutex::new(port)),
            paused,
            shutdown,
            peer: path.to_string(),
        })
    }
}

fn reader_loop(
    mut port: Box<dyn SerialPort>,
    tx: mpsc::Sender<Bytes>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    name: String,
) {
    let mut buffer = [0u8; READ_CHUNK];

    while !shutdown.load(Ordering::Relaxed) {
        if paused.load(Ordering::Acquire) {
            thread::sleep(PAUSED_POLL);
            continue;
        }

        match port.read(&mut buffer) {
            Ok(0) => continue,
            Ok(n) => {
                if tx.blocking_send(Bytes::copy_from_slice(&buffer[..n])).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(port = %name, error = %e, "Serial read failed, closing");
                break;
            }
        }
    }

    debug!(port = %name, "Serial reader stopped");
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.chunks.recv().await)
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let writer = Arc::clone(&self.writer);
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut port = writer.lock().unwrap_or_else(PoisonError::into_inner);
            port.write_all(&data)?;
            port.flush()
        })
        .await
        .map_err(|e| {
            SensorError::connection_failed_with_source("serial writer task failed", Box::new(e))
        })??;

        Ok(())
    }

    fn pause(&mut self) {
        self.paused.store(true, Ordering::Release);
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
