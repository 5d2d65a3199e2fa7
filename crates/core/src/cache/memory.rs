//! In-process cache store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{CacheBucket, CacheStore};
use crate::errors::CacheError;

#[derive(Default)]
struct State {
    buckets: HashMap<String, CacheBucket>,
    markers: HashMap<String, DateTime<Utc>>,
}

/// A [`CacheStore`] held entirely in memory.
#[derive(Default)]
pub struct MemoryCacheStore {
    state: Mutex<State>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.state().buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<CacheBucket>, CacheError> {
        Ok(self.state().buckets.get(key).cloned())
    }

    fn set(&self, key: &str, bucket: &CacheBucket) -> Result<(), CacheError> {
        self.state()
            .buckets
            .insert(key.to_string(), bucket.clone());
        Ok(())
    }

    fn invalidate_tag(&self, tag: &str) -> Result<usize, CacheError> {
        let mut state = self.state();
        let before = state.buckets.len();
        state.buckets.retain(|_, bucket| bucket.tag != tag);
        Ok(before - state.buckets.len())
    }

    fn read_marker(&self, name: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.state().markers.get(name).copied())
    }

    fn write_marker(&self, name: &str, at: DateTime<Utc>) -> Result<(), CacheError> {
        self.state().markers.insert(name.to_string(), at);
        Ok(())
    }
}
