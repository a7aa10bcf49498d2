//! Response cache with in-flight request sharing.
//!
//! Entries are keyed by [`ListRequest::cache_key`](lister_types::ListRequest::cache_key)
//! and never expire. Callers needing fresh data fetch with
//! [`FetchPolicy::Refresh`], which bypasses the stored entry and refills it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures_util::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use serde_json::Value;
use tracing::debug;

use crate::error::ListerError;

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>, ListerError>>>;

/// Whether a fetch may be answered from the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPolicy {
    #[default]
    CacheFirst,
    /// Skip stored entries and in-flight requests; store the fresh response.
    Refresh,
}

#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Arc<Value>>>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Return the cached payload for `key`, or run `fetch` to produce it.
    ///
    /// Concurrent callers asking for the same key while a request is running
    /// await that request instead of issuing another. Failures are returned to
    /// every waiter and never cached.
    pub async fn get_or_fetch<F>(&self, key: &str, policy: FetchPolicy, fetch: F) -> Result<Arc<Value>, ListerError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Value, ListerError>>,
    {
        if policy == FetchPolicy::CacheFirst
            && let Some(hit) = self.get(key)
        {
            debug!(cache_key = %key, "response cache hit");
            return Ok(hit);
        }

        let shared = {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| ListerError::Transport("response cache lock poisoned".to_string()))?;
            match in_flight.get(key) {
                Some(existing) if policy == FetchPolicy::CacheFirst => {
                    debug!(cache_key = %key, "joining in-flight request");
                    existing.clone()
                }
                _ => {
                    let shared = fetch().map(|result| result.map(Arc::new)).boxed().shared();
                    in_flight.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        let result = shared.clone().await;
        self.settle(key, &shared, &result);
        result
    }

    /// Retire a finished request. Only the request still registered for `key`
    /// is removed, so a newer refresh is never dropped by an older waiter.
    fn settle(&self, key: &str, shared: &SharedFetch, result: &Result<Arc<Value>, ListerError>) {
        let still_registered = match self.in_flight.lock() {
            Ok(mut in_flight) => {
                let registered = in_flight.get(key).is_some_and(|current| current.ptr_eq(shared));
                if registered {
                    in_flight.remove(key);
                }
                registered
            }
            Err(_) => false,
        };
        if still_registered
            && let Ok(payload) = result
            && let Ok(mut entries) = self.entries.lock()
        {
            entries.insert(key.to_string(), payload.clone());
        }
    }
}
