//! Serial-attached range sensor

use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument, info_span};

use crate::codec::RangeFrameDecoder;
use crate::config::RangeSensorConfig;
use crate::hub::Hub;
use crate::session::{Activity, RangerSession, RangerSummary};
use crate::source::MeasurementSource;
use crate::transport::Transport;
use crate::types::Sample;
use crate::Result;

/// A text-protocol range sensor and the hub its readings land in.
///
/// Bytes arrive either from [`RangeSensor::run`] (which opens the
/// configured serial port), from any other [`Transport`] via
/// [`RangeSensor::run_with`], or pushed by the host through
/// [`RangeSensor::feed`].
#[derive(Debug)]
pub struct RangeSensor {
    config: RangeSensorConfig,
    hub: Arc<Hub>,
    activity: Arc<Activity>,
    fed: Mutex<RangeFrameDecoder>,
    dispatch: Option<Dispatch>,
}

impl RangeSensor {
    /// Build a sensor, compiling its pattern and field table.
    pub fn new(config: RangeSensorConfig) -> Result<Self> {
        config.validate()?;
        let decoder = config.decoder()?;
        let hub = Arc::new(Hub::new(Arc::clone(decoder.table())));

        Ok(Self {
            config,
            hub,
            activity: Arc::new(Activity::new()),
            fed: Mutex::new(decoder),
            dispatch: None,
        })
    }

    /// Route this sensor's logs to `dispatch` instead of the global default.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Settings this sensor was built from.
    pub fn config(&self) -> &RangeSensorConfig {
        &self.config
    }

    /// Shared handle to the hub, for consumers that outlive `&self`.
    pub fn shared_hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// Whether a read session is running.
    pub fn is_running(&self) -> bool {
        self.activity.is_connected()
    }

    /// When a reading was last decoded.
    pub fn last_seen(&self) -> Option<SystemTime> {
        self.activity.last_seen()
    }

    /// Open the configured serial port and read until it closes or `cancel` fires.
    #[cfg(feature = "serial")]
    pub async fn run(&self, cancel: CancellationToken) -> Result<RangerSummary> {
        let transport = crate::transport::SerialTransport::open(
            &self.config.port,
            self.config.baud_rate,
            self.config.timeout(),
        )?;
        self.run_with(transport, cancel).await
    }

    /// Read from `transport` until it closes or `cancel` fires.
    ///
    /// Each run starts with an empty buffer.
    pub async fn run_with<T: Transport>(
        &self,
        transport: T,
        cancel: CancellationToken,
    ) -> Result<RangerSummary> {
        let span = info_span!("range_sensor", peer = transport.peer());
        let session = RangerSession::new(transport, self.config.decoder()?, Arc::clone(&self.hub))
            .with_backpressure(self.config.backpressure)
            .with_activity(Arc::clone(&self.activity));

        let task = session.run(cancel).instrument(span);
        let summary = match self.dispatch.clone() {
            Some(dispatch) => task.with_subscriber(dispatch).await,
            None => task.await,
        };
        Ok(summary)
    }

    /// Decode bytes the host read itself.
    ///
    /// Uses a buffer separate from any running session. Returns the published
    /// sample when `chunk` completes a frame.
    pub fn feed(&self, chunk: &[u8]) -> Result<Option<Arc<Sample>>> {
        let mut decoder = self.fed.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sample) = decoder.push(chunk)? else {
            return Ok(None);
        };
        drop(decoder);

        self.activity.touch();
        Ok(Some(self.hub.publish(sample)))
    }
}

impl MeasurementSource for RangeSensor {
    fn hub(&self) -> &Hub {
        &self.hub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use crate::SensorError;

    #[test]
    fn fed_chunks_reassemble() {
        let sensor = RangeSensor::new(RangeSensorConfig::default()).unwrap();

        assert!(sensor.feed(b"R12").unwrap().is_none());
        let sample = sensor.feed(b"3 ").unwrap().unwrap();

        assert_eq!(sample.value("distance"), Some(&Value::from("123")));
        assert_eq!(sensor.get_value("distance").unwrap(), Some(Value::from("123")));
        assert!(sensor.last_seen().is_some());
    }

    #[test]
    fn feed_surfaces_schema_mismatch() {
        let config = RangeSensorConfig {
            pattern: r"R(\d+)x(\d+)\s".to_string(),
            ..RangeSensorConfig::default()
        };
        let sensor = RangeSensor::new(config).unwrap();

        let result = sensor.feed(b"R1x2 ");
        assert!(matches!(
            result,
            Err(SensorError::TooManyCapturedValues { captured: 2, declared: 1 })
        ));
        assert!(sensor.data().is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        let config = RangeSensorConfig { pattern: "R(".to_string(), ..RangeSensorConfig::default() };
        assert!(matches!(RangeSensor::new(config), Err(SensorError::Pattern { .. })));
    }

    #[test]
    fn zero_timeout_is_rejected_at_construction() {
        let config = RangeSensorConfig { timeout_secs: 0, ..RangeSensorConfig::default() };
        assert!(matches!(RangeSensor::new(config), Err(SensorError::Config { .. })));
    }
}
