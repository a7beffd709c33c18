//! Datalogger connection loop

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::Activity;
use crate::codec::solarman::{HEADER_LEN, SolarmanFrame};
use crate::codec::{Acknowledgement, FrameHeader, FrameType, SolarmanDecoder};
use crate::hub::Hub;
use crate::transport::{FrameReader, Transport};
use crate::{Result, SensorError};

/// What one datalogger connection delivered before it ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SolarmanSummary {
    /// Complete frames received
    pub frames: u64,
    /// Frames of type 0x42
    pub data_frames: u64,
    /// Frames of type 0x41
    pub heartbeats: u64,
    /// Frames of any other type, acknowledged but not decoded
    pub unknown_frames: u64,
}

/// Reads frames from one datalogger, acknowledges each, and publishes
/// decoded data frames.
pub struct SolarmanSession<T> {
    reader: FrameReader<T>,
    decoder: SolarmanDecoder,
    hub: Arc<Hub>,
    activity: Arc<Activity>,
}

impl<T: Transport> SolarmanSession<T> {
    /// Wrap one datalogger connection; decoded samples go to `hub`.
    pub fn new(transport: T, decoder: SolarmanDecoder, hub: Arc<Hub>) -> Self {
        Self { reader: FrameReader::new(transport), decoder, hub, activity: Arc::default() }
    }

    /// Share liveness bookkeeping with other sessions.
    pub fn with_activity(mut self, activity: Arc<Activity>) -> Self {
        self.activity = activity;
        self
    }

    /// Run until the datalogger disconnects or `cancel` fires.
    ///
    /// Frames are processed strictly in arrival order: a frame is published
    /// and acknowledged before the next header is read.
    pub async fn run(mut self, cancel: CancellationToken) -> SolarmanSummary {
        let activity = Arc::clone(&self.activity);
        let _open = activity.enter();
        let peer = self.reader.transport().peer().to_string();
        let mut summary = SolarmanSummary::default();

        info!(%peer, "Datalogger connected");

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(%peer, "Datalogger session cancelled");
                    break;
                }
                frame = self.read_frame() => frame,
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!(%peer, "Datalogger closed the connection");
                    break;
                }
                Err(e) if e.is_disconnect() => {
                    warn!(%peer, error = %e, "Datalogger connection lost");
                    break;
                }
                Err(e) => {
                    warn!(%peer, error = %e, "Datalogger read failed");
                    break;
                }
            };

            if let Err(e) = self.handle_frame(frame, &mut summary).await {
                warn!(%peer, error = %e, "Unable to acknowledge frame, closing");
                break;
            }
        }

        info!(
            %peer,
            frames = summary.frames,
            data_frames = summary.data_frames,
            heartbeats = summary.heartbeats,
            "Datalogger session ended"
        );
        summary
    }

    async fn read_frame(&mut self) -> Result<Option<SolarmanFrame>> {
        let Some(header_bytes) = self.reader.read_exact(HEADER_LEN).await? else {
            return Ok(None);
        };
        let header = FrameHeader::parse(&header_bytes)?;
        trace!(?header, "Parsed frame header");

        let body_len = header.body_len();
        let body = self
            .reader
            .read_exact(body_len)
            .await?
            .ok_or(SensorError::ShortRead { expected: body_len, received: 0 })?;

        Ok(Some(SolarmanFrame::new(header, &header_bytes, &body)))
    }

    async fn handle_frame(
        &mut self,
        frame: SolarmanFrame,
        summary: &mut SolarmanSummary,
    ) -> Result<()> {
        summary.frames += 1;
        match frame.header.kind() {
            FrameType::Data => summary.data_frames += 1,
            FrameType::Heartbeat => summary.heartbeats += 1,
            FrameType::Unknown(_) => summary.unknown_frames += 1,
        }

        // A decoded frame is published even if the peer is gone by the time
        // the acknowledgement is written.
        self.activity.touch();
        if let Some(sample) = self.decoder.decode(&frame) {
            self.hub.publish(sample);
        }

        let ack = Acknowledgement::for_frame(&frame, unix_time()).encode();
        self.reader.transport_mut().write_all(&ack).await?;
        trace!(ack = ?ack.as_ref(), "Sent acknowledgement");
        Ok(())
    }
}

fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::solarman::{encode_frame, verify_checksum};
    use crate::transport::{ChannelHandle, ChannelTransport};
    use crate::types::{DescriptorTable, FieldDescriptor, FieldType};
    use bytes::Bytes;

    const SERIAL: u32 = 0x1234_5678;

    fn setup() -> (SolarmanSession<ChannelTransport>, ChannelHandle, Arc<Hub>, Arc<Activity>) {
        let table = Arc::new(
            DescriptorTable::new(vec![FieldDescriptor::numeric("volts", FieldType::UInt16, 11, 0.1)])
                .unwrap(),
        );
        let hub = Arc::new(Hub::new(Arc::clone(&table)));
        let activity = Arc::new(Activity::new());
        let (transport, handle) = ChannelTransport::pair("logger", 16);
        let decoder = SolarmanDecoder::new(table).unwrap();
        let session = SolarmanSession::new(transport, decoder, Arc::clone(&hub))
            .with_activity(Arc::clone(&activity));
        (session, handle, hub, activity)
    }

    #[tokio::test]
    async fn data_frame_is_acknowledged_then_published() {
        let (session, mut handle, hub, activity) = setup();
        let task = tokio::spawn(session.run(CancellationToken::new()));

        let frame = encode_frame(0x42, 0x00, 0x07, SERIAL, &550u16.to_le_bytes()).unwrap();
        // Split the frame to exercise reassembly
        handle.inbound.send(frame.slice(..5)).await.unwrap();
        handle.inbound.send(frame.slice(5..)).await.unwrap();

        let ack = handle.outbound.recv().await.unwrap();
        assert_eq!(ack.len(), 23);
        assert_eq!(ack[4], 0x12);
        assert_eq!(&ack[5..7], &[0x07, 0x07]);
        assert_eq!(&ack[7..11], &SERIAL.to_le_bytes());
        assert_eq!(ack[11], 0x26); // first payload byte echoed
        assert!(verify_checksum(&ack));

        drop(handle.inbound);
        let summary = task.await.unwrap();

        assert_eq!(summary.data_frames, 1);
        let volts = hub.get_value("volts").unwrap().and_then(|v| v.as_f64()).unwrap();
        assert!((volts - 55.0).abs() < 1e-9);
        assert!(activity.last_seen().is_some());
        assert!(!activity.is_connected());
    }

    #[tokio::test]
    async fn heartbeat_is_acknowledged_without_publishing() {
        let (session, mut handle, hub, activity) = setup();
        let task = tokio::spawn(session.run(CancellationToken::new()));

        let frame = encode_frame(0x41, 0x00, 0x03, SERIAL, &[0x00]).unwrap();
        handle.inbound.send(frame).await.unwrap();

        let ack = handle.outbound.recv().await.unwrap();
        assert_eq!(ack[4], 0x11);

        drop(handle.inbound);
        let summary = task.await.unwrap();

        assert_eq!(summary.heartbeats, 1);
        assert!(hub.cache().latest().is_none());
        assert!(activity.last_seen().is_some());
    }

    #[tokio::test]
    async fn unknown_frame_is_acknowledged_and_session_continues() {
        let (session, mut handle, hub, _) = setup();
        let task = tokio::spawn(session.run(CancellationToken::new()));

        let unknown = encode_frame(0x48, 0x00, 0x05, SERIAL, &[0x09, 0x09]).unwrap();
        handle.inbound.send(unknown).await.unwrap();

        let ack = handle.outbound.recv().await.unwrap();
        assert_eq!(ack.len(), 23);
        assert_eq!(ack[4], 0x18);
        assert_eq!(&ack[5..7], &[0x05, 0x05]);
        assert!(verify_checksum(&ack));
        assert!(hub.cache().latest().is_none());

        let data = encode_frame(0x42, 0x00, 0x06, SERIAL, &550u16.to_le_bytes()).unwrap();
        handle.inbound.send(data).await.unwrap();
        let ack = handle.outbound.recv().await.unwrap();
        assert_eq!(ack[4], 0x12);

        drop(handle.inbound);
        let summary = task.await.unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.unknown_frames, 1);
        assert_eq!(summary.data_frames, 1);
        assert!(hub.cache().latest().is_some());
    }

    #[tokio::test]
    async fn data_frame_is_published_when_ack_cannot_be_sent() {
        let (session, handle, hub, activity) = setup();
        let ChannelHandle { inbound, outbound, .. } = handle;
        drop(outbound);
        let task = tokio::spawn(session.run(CancellationToken::new()));

        let frame = encode_frame(0x42, 0x00, 0x01, SERIAL, &550u16.to_le_bytes()).unwrap();
        inbound.send(frame).await.unwrap();
        drop(inbound);

        let summary = task.await.unwrap();
        assert_eq!(summary.data_frames, 1);
        let volts = hub.get_value("volts").unwrap().and_then(|v| v.as_f64()).unwrap();
        assert!((volts - 55.0).abs() < 1e-9);
        assert!(activity.last_seen().is_some());
    }

    #[tokio::test]
    async fn truncated_frame_ends_session_without_ack() {
        let (session, mut handle, hub, _) = setup();
        let task = tokio::spawn(session.run(CancellationToken::new()));

        let frame = encode_frame(0x42, 0x00, 0x01, SERIAL, &[0x01, 0x02]).unwrap();
        handle.inbound.send(frame.slice(..frame.len() - 1)).await.unwrap();
        drop(handle.inbound);

        let summary = task.await.unwrap();
        assert_eq!(summary.frames, 0);
        assert!(handle.outbound.recv().await.is_none());
        assert!(hub.cache().latest().is_none());
    }

    #[tokio::test]
    async fn cancellation_stops_an_idle_session() {
        let (session, handle, _, activity) = setup();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(session.run(cancel.clone()));

        handle.inbound.send(Bytes::from_static(&[0xA5, 0x02])).await.unwrap();
        cancel.cancel();

        let summary = task.await.unwrap();
        assert_eq!(summary, SolarmanSummary::default());
        assert!(!activity.is_connected());
    }
}
