//! Latest-sample cache

use std::sync::Arc;
use tokio::sync::watch;

use crate::types::{DescriptorTable, Sample, Value};
use crate::{Result, SensorError};

/// Holds the most recent sample of one decoder.
///
/// The cache is a watch channel: replacing the sample swaps a single
/// `Arc`, so readers see either the previous sample or the new one, never a
/// mix of both.
#[derive(Debug)]
pub struct SampleCache {
    /// Vocabulary queries are checked against
    table: Arc<DescriptorTable>,

    /// Latest sample; `None` until the first successful decode
    latest: watch::Sender<Option<Arc<Sample>>>,
}

impl SampleCache {
    /// Create an empty cache for the fields in `table`.
    pub fn new(table: Arc<DescriptorTable>) -> Self {
        let (latest, _) = watch::channel(None);
        Self { table, latest }
    }

    /// Decoded value of `name` from the latest sample.
    ///
    /// Returns `Ok(None)` when no sample has arrived yet or the field was
    /// missing from the latest frame, and `UnknownField` for names the
    /// decoder does not declare.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        if !self.table.contains(name) {
            return Err(SensorError::unknown_field(name));
        }

        Ok(self.latest.borrow().as_ref().and_then(|sample| sample.value(name).cloned()))
    }

    /// The latest sample, if any.
    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.latest.borrow().clone()
    }

    /// Atomically replace the latest sample.
    pub fn replace(&self, sample: Arc<Sample>) {
        self.latest.send_replace(Some(sample));
    }

    /// Receiver that observes every replacement.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<Sample>>> {
        self.latest.subscribe()
    }

    /// Declared field names.
    pub fn fields(&self) -> Vec<String> {
        self.table.names()
    }

    /// Descriptor table backing this cache.
    pub fn table(&self) -> &Arc<DescriptorTable> {
        &self.table
    }
}
