//! Frame codecs.
//!
//! - [`solarman`]: binary, length-prefixed datalogger frames with a
//!   mandatory acknowledgement
//! - [`ranger`]: free-text ranging sensor frames delimited by a pattern
//!
//! Codecs are pure: they turn bytes into [`Sample`](crate::types::Sample)s
//! and never touch sockets, caches or subscribers.

pub mod ranger;
pub mod solarman;

pub use ranger::RangeFrameDecoder;
pub use solarman::{Acknowledgement, FrameHeader, FrameType, SolarmanDecoder, SolarmanFrame};
