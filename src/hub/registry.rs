//! Subscriber registry

use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, trace};

/// Callback invoked with a notification argument.
pub type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Handle returned by [`SubscriberRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Entries<A: ?Sized> {
    /// Callbacks keyed by id; ids only grow, so key order is registration order
    by_id: BTreeMap<u64, Callback<A>>,
    /// Allocation address of each callback, for identity dedup
    by_identity: HashMap<usize, u64>,
    next_id: u64,
}

/// Ordered set of callbacks, deduplicated by `Arc` identity.
///
/// Notification runs callbacks in registration order on the caller's
/// thread. The lock is released before any callback runs, so callbacks may
/// subscribe or unsubscribe while being notified; such changes take effect
/// from the next notification.
pub struct SubscriberRegistry<A: ?Sized> {
    entries: Mutex<Entries<A>>,
}

impl<A: ?Sized> Default for SubscriberRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> std::fmt::Debug for SubscriberRegistry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry").field("len", &self.len()).finish()
    }
}

fn identity<A: ?Sized>(callback: &Callback<A>) -> usize {
    Arc::as_ptr(callback).cast::<()>() as usize
}

impl<A: ?Sized> SubscriberRegistry<A> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                by_id: BTreeMap::new(),
                by_identity: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries<A>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback.
    ///
    /// Registering the same `Arc` again returns the id it already has.
    pub fn subscribe(&self, callback: Callback<A>) -> SubscriptionId {
        let mut entries = self.lock();
        let key = identity(&callback);

        if let Some(&id) = entries.by_identity.get(&key) {
            return SubscriptionId(id);
        }

        let id = entries.next_id;
        entries.next_id += 1;
        entries.by_identity.insert(key, id);
        entries.by_id.insert(id, callback);
        SubscriptionId(id)
    }

    /// Remove a callback by id. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.lock();
        match entries.by_id.remove(&id.0) {
            Some(callback) => {
                let key = identity(&callback);
                entries.by_identity.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Remove a callback by identity. Returns whether it was registered.
    pub fn unsubscribe_callback(&self, callback: &Callback<A>) -> bool {
        let id = self.lock().by_identity.get(&identity(callback)).copied();
        id.is_some_and(|id| self.unsubscribe(SubscriptionId(id)))
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback with `arg`, in registration order.
    ///
    /// A panicking callback is logged and skipped; the rest still run.
    /// Returns the number of callbacks that completed.
    pub fn notify(&self, arg: &A) -> usize {
        let snapshot: Vec<(u64, Callback<A>)> =
            self.lock().by_id.iter().map(|(id, cb)| (*id, Arc::clone(cb))).collect();

        let mut completed = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(arg))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!(subscription = id, %message, "Subscriber callback panicked");
                }
            }
        }

        trace!(completed, "Notified subscribers");
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Callback<u32> {
        let log = Arc::clone(log);
        Arc::new(move |_: &u32| log.lock().unwrap().push(tag))
    }

    #[test]
    fn notifies_in_registration_order() {
        let registry = SubscriberRegistry::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(recorder(&log, "first"));
        registry.subscribe(recorder(&log, "second"));
        registry.subscribe(recorder(&log, "third"));

        assert_eq!(registry.notify(&1), 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn same_callback_is_registered_once() {
        let registry = SubscriberRegistry::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: Callback<u32> = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let first = registry.subscribe(Arc::clone(&callback));
        let second = registry.subscribe(Arc::clone(&callback));

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        registry.notify(&0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(registry.unsubscribe_callback(&callback));
        assert!(!registry.unsubscribe_callback(&callback));
        assert!(registry.is_empty());
    }

    #[test]
    fn panicking_callback_does_not_stop_the_rest() {
        let registry = SubscriberRegistry::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(recorder(&log, "before"));
        registry.subscribe(Arc::new(|_: &u32| panic!("subscriber failure")));
        registry.subscribe(recorder(&log, "after"));

        assert_eq!(registry.notify(&7), 2);
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn unsubscribe_by_id() {
        let registry = SubscriberRegistry::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = registry.subscribe(recorder(&log, "gone"));
        registry.subscribe(recorder(&log, "kept"));

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.notify(&0);
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[test]
    fn callbacks_may_unsubscribe_themselves() {
        let registry = Arc::new(SubscriberRegistry::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&registry);
        let counter = Arc::clone(&calls);
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let own_id = Arc::clone(&slot);
        let id = registry.subscribe(Arc::new(move |_: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let (Some(registry), Some(id)) = (weak.upgrade(), *own_id.lock().unwrap()) {
                registry.unsubscribe(id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        registry.notify(&0);
        registry.notify(&0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
