//! Consumer-facing interface shared by every source.

use futures::stream::BoxStream;
use std::sync::Arc;

use crate::hub::{Callback, Hub, SubscriptionId};
use crate::types::{Sample, UpdateRate, Value};
use crate::Result;

/// Read access and change notification for one decoded stream.
///
/// Implementors only provide [`MeasurementSource::hub`]; everything else
/// reads or subscribes through it.
pub trait MeasurementSource {
    /// The hub this source publishes into.
    fn hub(&self) -> &Hub;

    /// Latest decoded value of `name`.
    ///
    /// `Ok(None)` when nothing has been decoded yet or the value was
    /// missing from the last frame; `Err` when `name` is not a field of this
    /// source.
    fn get_value(&self, name: &str) -> Result<Option<Value>> {
        self.hub().get_value(name)
    }

    /// Field names this source can decode, in declaration order.
    fn get_fields(&self) -> Vec<String> {
        self.hub().cache().fields()
    }

    /// Latest decoded sample.
    fn data(&self) -> Option<Arc<Sample>> {
        self.hub().cache().latest()
    }

    /// Bytes of the frame behind the latest sample.
    fn raw_data(&self) -> Option<Arc<[u8]>> {
        self.data().map(|sample| Arc::clone(&sample.raw))
    }

    /// Call `callback` after every decoded sample.
    ///
    /// Registering the same `Arc` twice keeps one registration.
    fn register_callback(&self, callback: Callback<Sample>) -> SubscriptionId {
        self.hub().value_subscribers().subscribe(callback)
    }

    /// Remove a callback; returns whether it was registered.
    fn remove_callback(&self, callback: &Callback<Sample>) -> bool {
        self.hub().value_subscribers().unsubscribe_callback(callback)
    }

    /// Call `callback` with the raw frame bytes after every decoded sample.
    fn register_raw_callback(&self, callback: Callback<[u8]>) -> SubscriptionId {
        self.hub().raw_subscribers().subscribe(callback)
    }

    /// Remove a raw callback; returns whether it was registered.
    fn remove_raw_callback(&self, callback: &Callback<[u8]>) -> bool {
        self.hub().raw_subscribers().unsubscribe_callback(callback)
    }

    /// Stream of samples, optionally rate limited.
    fn samples(&self, rate: UpdateRate) -> BoxStream<'static, Arc<Sample>> {
        self.hub().samples(rate)
    }
}

impl MeasurementSource for Hub {
    fn hub(&self) -> &Hub {
        self
    }
}
