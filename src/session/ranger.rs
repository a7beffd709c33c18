//! Range sensor read loop

use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Activity;
use crate::codec::RangeFrameDecoder;
use crate::hub::Hub;
use crate::transport::Transport;
use crate::types::Sample;
use crate::Result;

/// What one range sensor session delivered before it ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RangerSummary {
    /// Chunks received from the transport
    pub chunks: u64,
    /// Samples published
    pub samples: u64,
    /// Matches discarded because they could not be decoded
    pub decode_errors: u64,
}

/// Feeds chunks from a serial line through a [`RangeFrameDecoder`].
pub struct RangerSession<T> {
    transport: T,
    decoder: RangeFrameDecoder,
    hub: Arc<Hub>,
    activity: Arc<Activity>,
    backpressure: bool,
}

impl<T: Transport> RangerSession<T> {
    /// Read `transport` through `decoder`; backpressure is on by default.
    pub fn new(transport: T, decoder: RangeFrameDecoder, hub: Arc<Hub>) -> Self {
        Self { transport, decoder, hub, activity: Arc::default(), backpressure: true }
    }

    /// Pause the transport while each chunk is decoded and published.
    ///
    /// Enabled by default. With it off, a fast sensor can queue chunks
    /// faster than subscribers consume them.
    pub fn with_backpressure(mut self, enabled: bool) -> Self {
        self.backpressure = enabled;
        self
    }

    /// Share liveness bookkeeping with the owning source.
    pub fn with_activity(mut self, activity: Arc<Activity>) -> Self {
        self.activity = activity;
        self
    }

    /// Run until the line closes, fails, or `cancel` fires.
    ///
    /// A chunk that completes a frame the decoder rejects is logged and
    /// counted; the session keeps reading.
    pub async fn run(mut self, cancel: CancellationToken) -> RangerSummary {
        let activity = Arc::clone(&self.activity);
        let _open = activity.enter();
        let peer = self.transport.peer().to_string();
        let mut summary = RangerSummary::default();

        info!(%peer, backpressure = self.backpressure, "Range sensor session started");

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(%peer, "Range sensor session cancelled");
                    break;
                }
                chunk = self.transport.next_chunk() => chunk,
            };

            let chunk = match chunk {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    info!(%peer, "Serial line closed");
                    break;
                }
                Err(e) => {
                    warn!(%peer, error = %e, "Serial read failed");
                    break;
                }
            };
            summary.chunks += 1;

            match self.process(chunk) {
                Ok(Some(_)) => summary.samples += 1,
                Ok(None) => {}
                Err(e) => {
                    summary.decode_errors += 1;
                    error!(%peer, error = %e, "Discarded range frame");
                }
            }
        }

        info!(%peer, samples = summary.samples, "Range sensor session ended");
        summary
    }

    /// Decode one chunk, publishing the sample it completes.
    pub fn process(&mut self, chunk: Bytes) -> Result<Option<Arc<Sample>>> {
        if self.backpressure {
            self.transport.pause();
        }

        let result = self.decoder.push(&chunk).map(|sample| {
            sample.map(|sample| {
                self.activity.touch();
                self.hub.publish(sample)
            })
        });

        if self.backpressure {
            self.transport.resume();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelHandle, ChannelTransport};
    use crate::types::{DescriptorTable, Value};

    fn setup(backpressure: bool) -> (RangerSession<ChannelTransport>, ChannelHandle, Arc<Hub>) {
        let decoder = RangeFrameDecoder::with_defaults().unwrap();
        let hub = Arc::new(Hub::new(Arc::clone(decoder.table())));
        let (transport, handle) = ChannelTransport::pair("/dev/ttyTEST", 16);
        let session = RangerSession::new(transport, decoder, Arc::clone(&hub))
            .with_backpressure(backpressure);
        (session, handle, hub)
    }

    #[tokio::test]
    async fn chunks_across_reads_publish_one_sample() {
        let (session, handle, hub) = setup(true);
        let task = tokio::spawn(session.run(CancellationToken::new()));

        handle.inbound.send(Bytes::from_static(b"R12")).await.unwrap();
        handle.inbound.send(Bytes::from_static(b"3 ")).await.unwrap();
        drop(handle);
        let summary = task.await.unwrap();

        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.samples, 1);
        assert_eq!(hub.get_value("distance").unwrap(), Some(Value::from("123")));
    }

    #[test]
    fn backpressure_pauses_around_each_chunk() {
        let (mut session, handle, _hub) = setup(true);

        session.process(Bytes::from_static(b"R0")).unwrap();
        session.process(Bytes::from_static(b"42 ")).unwrap();

        assert_eq!(handle.pause_count(), 2);
        assert!(!handle.is_paused());
    }

    #[test]
    fn without_backpressure_the_transport_is_never_paused() {
        let (mut session, handle, hub) = setup(false);

        let sample = session.process(Bytes::from_static(b"R042 ")).unwrap().unwrap();

        assert_eq!(handle.pause_count(), 0);
        assert_eq!(sample.value("distance"), Some(&Value::from("042")));
        assert!(hub.cache().latest().is_some());
    }

    #[tokio::test]
    async fn decode_errors_are_counted_and_the_session_continues() {
        let table = Arc::new(DescriptorTable::from_capture_names(["distance"]).unwrap());
        let decoder = RangeFrameDecoder::new(r"R(\d+)x(\d+)\s", Arc::clone(&table)).unwrap();
        let hub = Arc::new(Hub::new(table));
        let (transport, handle) = ChannelTransport::pair("/dev/ttyTEST", 16);
        let task = tokio::spawn(
            RangerSession::new(transport, decoder, Arc::clone(&hub)).run(CancellationToken::new()),
        );

        handle.inbound.send(Bytes::from_static(b"R1x2 ")).await.unwrap();
        handle.inbound.send(Bytes::from_static(b"R3x4 ")).await.unwrap();
        drop(handle);

        let summary = task.await.unwrap();
        assert_eq!(summary.decode_errors, 2);
        assert_eq!(summary.samples, 0);
        assert!(hub.cache().latest().is_none());
    }
}
