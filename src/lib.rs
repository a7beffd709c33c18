//! Stream decoders for Solarman inverter dataloggers and MaxSonar range sensors.
//!
//! sensorwire turns raw byte streams into named, scaled measurement values:
//!
//! - **Datalogger server**: accepts TCP connections from a Solarman
//!   datalogger, decodes its binary frames and acknowledges every one
//! - **Range sensor**: reads free text from a serial line and extracts
//!   readings with a regular expression
//! - **Hub**: latest-value cache plus value and raw-frame callbacks, shared
//!   by both decoders behind the [`MeasurementSource`] trait
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sensorwire::{MeasurementSource, SensorWire};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> sensorwire::Result<()> {
//!     let server = SensorWire::listen("0.0.0.0:10000".parse().unwrap())?;
//!     server.register_callback(std::sync::Arc::new(|sample: &sensorwire::Sample| {
//!         println!("{:?}", sample.value("ac_output_W"));
//!     }));
//!
//!     server.run(CancellationToken::new()).await
//! }
//! ```

// Core types and error handling
pub mod codec;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Streaming architecture
pub mod hub;
pub mod session;
pub mod source;
pub mod sources;
pub mod stream;
pub mod transport;

// Host-facing helpers
pub mod config;
pub mod logging;
pub mod metadata;
pub mod presets;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::{Config, DataloggerConfig, RangeSensorConfig};
pub use hub::{Callback, Hub, SubscriptionId};
pub use source::MeasurementSource;
pub use sources::{DataloggerServer, RangeSensor};

use std::net::SocketAddr;

/// Unified entry point for building sources.
///
/// # Examples
///
/// ```rust,no_run
/// use sensorwire::{Config, SensorWire};
///
/// # fn main() -> sensorwire::Result<()> {
/// let config = Config::load("sensorwire.yaml")?;
/// let sources = SensorWire::from_config(&config)?;
/// assert!(sources.datalogger.is_some() || sources.range_sensor.is_some());
/// # Ok(())
/// # }
/// ```
pub struct SensorWire;

/// Sources enabled by a [`Config`].
#[derive(Debug, Default)]
pub struct Sources {
    pub datalogger: Option<DataloggerServer>,
    pub range_sensor: Option<RangeSensor>,
}

impl SensorWire {
    /// Datalogger server on `listen` using the Solis field layout.
    pub fn listen(listen: SocketAddr) -> Result<DataloggerServer> {
        DataloggerServer::new(DataloggerConfig { listen, ..DataloggerConfig::default() })
    }

    /// Range sensor on serial `port` with default settings.
    pub fn range_sensor(port: impl Into<String>) -> Result<RangeSensor> {
        RangeSensor::new(RangeSensorConfig { port: port.into(), ..RangeSensorConfig::default() })
    }

    /// Build every source the configuration enables.
    ///
    /// # Errors
    ///
    /// Returns an error if a field table or pattern is invalid.
    pub fn from_config(config: &Config) -> Result<Sources> {
        Ok(Sources {
            datalogger: config.datalogger.clone().map(DataloggerServer::new).transpose()?,
            range_sensor: config.range_sensor.clone().map(RangeSensor::new).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_enabled_sources_only() {
        let config = Config::from_yaml_str("range_sensor:\n  port: /dev/ttyUSB0\n").unwrap();
        let sources = SensorWire::from_config(&config).unwrap();

        assert!(sources.datalogger.is_none());
        let sensor = sources.range_sensor.unwrap();
        assert_eq!(sensor.config().port, "/dev/ttyUSB0");
        assert_eq!(sensor.get_fields(), vec!["distance".to_string()]);
    }
}
