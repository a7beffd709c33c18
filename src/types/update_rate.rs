//! Update rate control for sample streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update rate for sample streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every sample the device sends
    Native,

    /// At most this many samples per second (latest wins)
    Max(u32),
}

impl UpdateRate {
    /// Get throttle interval if needed
    ///
    /// `Max(0)` is treated as `Native`.
    pub fn throttle_interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_interval_matches_rate() {
        assert_eq!(UpdateRate::Native.throttle_interval(), None);
        assert_eq!(UpdateRate::Max(0).throttle_interval(), None);
        assert_eq!(UpdateRate::Max(5).throttle_interval(), Some(Duration::from_millis(200)));
    }
}
