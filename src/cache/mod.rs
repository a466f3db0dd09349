use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::api::types::ResponseBody;
use crate::error::RequestError;

/// Outcome of a cached request, shared by every caller that asked for it.
pub type SharedResponse = Shared<BoxFuture<'static, Result<ResponseBody, RequestError>>>;

/// URL-keyed cache of in-flight GET responses.
///
/// The future is stored rather than its result, so identical concurrent
/// requests collapse into one network call. Entries live until removed
/// explicitly; failed responses stay cached as well.
#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, SharedResponse>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `key`, inserting the future produced by `fetch`
    /// on a miss. Lookup and insertion happen under one lock.
    pub fn get_or_insert_with<F>(&self, key: &str, fetch: F) -> SharedResponse
    where
        F: FnOnce() -> BoxFuture<'static, Result<ResponseBody, RequestError>>,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(key) {
            debug!("Cache hit for {}", key);
            return existing.clone();
        }
        debug!("Cache miss for {}", key);
        let shared = fetch().shared();
        entries.insert(key.to_string(), shared.clone());
        shared
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Remove entry from cache
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
