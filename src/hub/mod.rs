//! Latest-value cache and subscriber notification.
//!
//! A [`Hub`] is what both decoders feed: one [`SampleCache`] plus two
//! [`SubscriberRegistry`] sets, one notified with the decoded sample and one
//! with the raw frame bytes.
//!
//! Publishing holds a lock across the replace and both notifications, so
//! sessions running on different worker threads cannot interleave their
//! updates. Callbacks run while that lock is held and must not publish.

mod cache;
mod registry;

pub use cache::SampleCache;
pub use registry::{Callback, SubscriberRegistry, SubscriptionId};

use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::stream::ThrottleExt;
use crate::types::{DescriptorTable, Sample, UpdateRate, Value};
use crate::Result;

/// Shared state between a decoder session and its consumers.
#[derive(Debug)]
pub struct Hub {
    cache: SampleCache,
    values: SubscriberRegistry<Sample>,
    raw: SubscriberRegistry<[u8]>,
    publish_lock: Mutex<()>,
}

impl Hub {
    /// Create a hub for the fields in `table`.
    pub fn new(table: Arc<DescriptorTable>) -> Self {
        Self {
            cache: SampleCache::new(table),
            values: SubscriberRegistry::new(),
            raw: SubscriberRegistry::new(),
            publish_lock: Mutex::new(()),
        }
    }

    /// Replace the cached sample, then notify value and raw subscribers.
    pub fn publish(&self, sample: Sample) -> Arc<Sample> {
        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let sample = Arc::new(sample);
        self.cache.replace(Arc::clone(&sample));

        let values = self.values.notify(&sample);
        let raw = self.raw.notify(&sample.raw);
        debug!(value_subscribers = values, raw_subscribers = raw, "Published sample");

        sample
    }

    /// Decoded value of `name` from the latest sample.
    pub fn get_value(&self, name: &str) -> Result<Option<Value>> {
        self.cache.get(name)
    }

    /// The sample cache.
    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    /// Subscribers notified with each decoded sample.
    pub fn value_subscribers(&self) -> &SubscriberRegistry<Sample> {
        &self.values
    }

    /// Subscribers notified with each raw frame.
    pub fn raw_subscribers(&self) -> &SubscriberRegistry<[u8]> {
        &self.raw
    }

    /// Stream of samples, starting with the current one if present.
    pub fn samples(&self, rate: UpdateRate) -> BoxStream<'static, Arc<Sample>> {
        let samples = WatchStream::new(self.cache.watch()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => samples.boxed(),
            Some(interval) => samples.throttle(interval).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn hub() -> Hub {
        Hub::new(Arc::new(DescriptorTable::from_capture_names(["distance"]).unwrap()))
    }

    fn sample(reading: &str) -> Sample {
        let values = HashMap::from([("distance".to_string(), Some(Value::from(reading)))]);
        Sample::new(values, format!("R{reading} ").into_bytes())
    }

    #[test]
    fn publish_updates_cache_and_both_channels() {
        let hub = hub();
        let seen = Arc::new(Mutex::new(None));
        let raw_calls = Arc::new(AtomicUsize::new(0));

        let seen_in_callback = Arc::clone(&seen);
        hub.value_subscribers().subscribe(Arc::new(move |sample: &Sample| {
            *seen_in_callback.lock().unwrap() = sample.value("distance").cloned();
        }));
        let counter = Arc::clone(&raw_calls);
        hub.raw_subscribers().subscribe(Arc::new(move |raw: &[u8]| {
            assert_eq!(raw, b"R042 ");
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        hub.publish(sample("042"));

        assert_eq!(hub.get_value("distance").unwrap(), Some(Value::from("042")));
        assert_eq!(*seen.lock().unwrap(), Some(Value::from("042")));
        assert_eq!(raw_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_can_read_the_new_sample_from_the_cache() {
        let hub = Arc::new(hub());
        let observed = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&hub);
        let slot = Arc::clone(&observed);
        hub.value_subscribers().subscribe(Arc::new(move |_: &Sample| {
            if let Some(hub) = weak.upgrade() {
                *slot.lock().unwrap() = hub.get_value("distance").ok().flatten();
            }
        }));

        hub.publish(sample("314"));
        assert_eq!(*observed.lock().unwrap(), Some(Value::from("314")));
    }

    #[tokio::test]
    async fn sample_stream_yields_published_samples() {
        let hub = hub();
        let mut stream = Box::pin(hub.samples(UpdateRate::Native));

        hub.publish(sample("100"));
        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("sample should arrive")
            .expect("stream should stay open");
        assert_eq!(first.value("distance"), Some(&Value::from("100")));
    }
}
