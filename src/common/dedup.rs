//! Collapsing of concurrent identical in-flight requests
//!
//! Several UI surfaces can ask for the same resource at once (balance on
//! mount, balance on focus). Keyed deduplication hands every concurrent
//! caller the same shared future so the network sees one request.

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;

/// Shares one in-flight future per key among concurrent callers
///
/// The output type must be `Clone` because every waiter receives its own
/// copy of the single result. Once the shared future resolves, the key is
/// cleared so the next call starts a fresh request.
pub struct RequestDeduplicator<T: Clone> {
    in_flight: Mutex<HashMap<String, Shared<BoxFuture<'static, T>>>>,
}

impl<T: Clone + Send + Sync + 'static> RequestDeduplicator<T> {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Join the in-flight request for `key`, or start one via `make`
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (shared, created) = {
            let mut map = self.in_flight.lock();
            match map.get(key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let shared = make().boxed().shared();
                    map.insert(key.to_string(), shared.clone());
                    (shared, true)
                }
            }
        };

        let result = shared.clone().await;

        if created {
            let mut map = self.in_flight.lock();
            // Only clear our own entry; a newer request under the same key
            // must not be evicted mid-flight.
            if let Some(current) = map.get(key) {
                if current.ptr_eq(&shared) {
                    map.remove(key);
                }
            }
        }

        result
    }

    /// Number of distinct requests currently in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for RequestDeduplicator<T> {
    fn default() -> Self {
        Self::new()
    }
}
