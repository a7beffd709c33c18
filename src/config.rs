//! YAML configuration for the measurement sources.
//!
//! ```yaml
//! datalogger:
//!   listen: 0.0.0.0:10000
//! range_sensor:
//!   port: /dev/ttyUSB0
//!   baud_rate: 9600
//!   fields: [distance]
//! ```
//!
//! Every key is optional; omitted keys take the defaults below.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::codec::RangeFrameDecoder;
use crate::codec::ranger::{DEFAULT_FIELD, DEFAULT_MAX_BUFFER_LEN, DEFAULT_PATTERN};
use crate::presets;
use crate::types::{DescriptorTable, FieldDescriptor};
use crate::{Result, SensorError};

/// Port the datalogger is pointed at by default.
pub const DEFAULT_LISTEN_PORT: u16 = 10000;
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyAMA0";
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration; each source is enabled by its presence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub datalogger: Option<DataloggerConfig>,
    pub range_sensor: Option<RangeSensorConfig>,
}

impl Config {
    /// Parse and validate YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| SensorError::ConfigFile { path: path.to_path_buf(), source })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml_str(&yaml)
    }

    /// Check that every enabled source can be constructed.
    pub fn validate(&self) -> Result<()> {
        if let Some(datalogger) = &self.datalogger {
            datalogger.table()?.require_binary()?;
        }
        if let Some(range_sensor) = &self.range_sensor {
            range_sensor.validate()?;
        }
        Ok(())
    }
}

/// TCP server settings for a Solarman datalogger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataloggerConfig {
    /// Address to accept datalogger connections on
    pub listen: SocketAddr,
    /// Frame layout; the Solis preset when omitted
    pub fields: Option<Vec<FieldDescriptor>>,
}

impl Default for DataloggerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT)),
            fields: None,
        }
    }
}

impl DataloggerConfig {
    /// Descriptor table for decoding data frames.
    pub fn table(&self) -> Result<DescriptorTable> {
        match &self.fields {
            Some(fields) => DescriptorTable::new(fields.clone()),
            None => presets::solis_inverter_table(),
        }
    }
}

/// Serial settings for a text-protocol range sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RangeSensorConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Serial read timeout
    pub timeout_secs: u64,
    /// Frame pattern; capture groups map to `fields` in order
    pub pattern: String,
    pub fields: Vec<String>,
    /// Pause the line while each chunk is decoded
    pub backpressure: bool,
    /// Unmatched bytes kept before the oldest are discarded
    pub max_buffer_len: usize,
}

impl Default for RangeSensorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            pattern: DEFAULT_PATTERN.to_string(),
            fields: vec![DEFAULT_FIELD.to_string()],
            backpressure: true,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
        }
    }
}

impl RangeSensorConfig {
    /// Check every setting without opening the port.
    pub fn validate(&self) -> Result<()> {
        // a zero serial timeout turns the reader thread into a busy loop
        if self.timeout_secs == 0 {
            return Err(SensorError::config_error(
                "range_sensor.timeout_secs",
                "must be at least 1",
            ));
        }
        self.decoder().map(drop)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Capture table built from `fields`.
    pub fn table(&self) -> Result<DescriptorTable> {
        if self.fields.is_empty() {
            return Err(SensorError::config_error(
                "range_sensor.fields",
                "at least one field name is required",
            ));
        }
        DescriptorTable::from_capture_names(self.fields.iter().cloned())
    }

    /// A fresh decoder for these settings.
    pub fn decoder(&self) -> Result<RangeFrameDecoder> {
        if self.max_buffer_len == 0 {
            return Err(SensorError::config_error(
                "range_sensor.max_buffer_len",
                "must be positive",
            ));
        }
        let decoder = RangeFrameDecoder::new(&self.pattern, Arc::new(self.table()?))?;
        Ok(decoder.with_max_buffer_len(self.max_buffer_len))
    }
}
