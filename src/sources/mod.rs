//! Ready-to-run sources: a TCP server for dataloggers and a serial range sensor.

mod datalogger;
mod range_sensor;

pub use datalogger::DataloggerServer;
pub use range_sensor::RangeSensor;
