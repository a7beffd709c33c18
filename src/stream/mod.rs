//! Stream utilities for sample subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
