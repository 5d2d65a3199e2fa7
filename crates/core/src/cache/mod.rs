//! Cache of fully assembled directory payloads.
//!
//! A [`CacheStore`] is a dumb key/tag store; [`SectionCache`] layers the
//! locale-scoped key, the invalidation tag and the interval-based
//! auto-invalidation policy on top of it.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::CacheError;
use crate::models::SectionResult;

/// Namespace of the directory cache key; the locale is appended.
pub const CACHE_KEY_PREFIX: &str = "ldapdir:directory_query";

/// Tag covering every cached directory payload.
pub const CACHE_TAG: &str = "ldapdir_directory_query";

/// Marker holding the time of the last cache write / invalidation.
pub const LAST_INVALIDATE_MARKER: &str = "last_cache_invalidate";

/// One stored payload: the full, unfiltered section list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBucket {
    pub created: DateTime<Utc>,
    pub payload: Vec<SectionResult>,
    pub tag: String,
}

/// Storage capability behind [`SectionCache`].
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheBucket>, CacheError>;

    /// Store a bucket under `key`, replacing any previous one. No expiry.
    fn set(&self, key: &str, bucket: &CacheBucket) -> Result<(), CacheError>;

    /// Drop every bucket carrying `tag`; returns how many were removed.
    fn invalidate_tag(&self, tag: &str) -> Result<usize, CacheError>;

    fn read_marker(&self, name: &str) -> Result<Option<DateTime<Utc>>, CacheError>;

    fn write_marker(&self, name: &str, at: DateTime<Utc>) -> Result<(), CacheError>;
}

/// Snapshot of the cache for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub key: String,
    pub present: bool,
    pub created: Option<DateTime<Utc>>,
    pub sections: usize,
    pub last_invalidate: Option<DateTime<Utc>>,
}

impl CacheStatus {
    /// Age of the cached payload at `now`, if one exists.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.created.map(|created| now - created)
    }
}

/// Locale-scoped, tag-invalidated directory cache.
#[derive(Clone)]
pub struct SectionCache {
    store: Arc<dyn CacheStore>,
    key: String,
}

impl SectionCache {
    pub fn new(store: Arc<dyn CacheStore>, locale: &str) -> Self {
        Self {
            store,
            key: Self::key_for(locale),
        }
    }

    pub fn key_for(locale: &str) -> String {
        format!("{CACHE_KEY_PREFIX}:{locale}")
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Result<Option<CacheBucket>, CacheError> {
        let bucket = self.store.get(&self.key)?;
        debug!(key = %self.key, hit = bucket.is_some(), "cache lookup");
        Ok(bucket)
    }

    /// Replace the cached payload.
    ///
    /// The tag is invalidated first so no stale bucket for another locale
    /// survives, then the write time is recorded as the last invalidation.
    pub fn set(&self, payload: Vec<SectionResult>) -> Result<CacheBucket, CacheError> {
        self.set_at(payload, Utc::now())
    }

    pub fn set_at(
        &self,
        payload: Vec<SectionResult>,
        now: DateTime<Utc>,
    ) -> Result<CacheBucket, CacheError> {
        self.store.invalidate_tag(CACHE_TAG)?;
        let bucket = CacheBucket {
            created: now,
            payload,
            tag: CACHE_TAG.to_string(),
        };
        self.store.set(&self.key, &bucket)?;
        self.store.write_marker(LAST_INVALIDATE_MARKER, now)?;
        debug!(key = %self.key, sections = bucket.payload.len(), "cache stored");
        Ok(bucket)
    }

    /// Drop every cached payload.
    pub fn invalidate(&self) -> Result<(), CacheError> {
        let removed = self.store.invalidate_tag(CACHE_TAG)?;
        info!(tag = CACHE_TAG, removed, "cache invalidated");
        Ok(())
    }

    /// Invalidate when at least `interval_secs` have passed since the last
    /// write. `interval_secs <= 0` disables auto-invalidation.
    pub fn invalidate_if_elapsed(&self, interval_secs: i64) -> Result<bool, CacheError> {
        self.invalidate_if_elapsed_at(interval_secs, Utc::now())
    }

    pub fn invalidate_if_elapsed_at(
        &self,
        interval_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, CacheError> {
        if interval_secs <= 0 {
            return Ok(false);
        }

        let elapsed = match self.store.read_marker(LAST_INVALIDATE_MARKER)? {
            Some(last) => (now - last).num_seconds() >= interval_secs,
            None => true,
        };
        if elapsed {
            self.invalidate()?;
        }
        Ok(elapsed)
    }

    pub fn status(&self) -> Result<CacheStatus, CacheError> {
        let bucket = self.store.get(&self.key)?;
        Ok(CacheStatus {
            key: self.key.clone(),
            present: bucket.is_some(),
            created: bucket.as_ref().map(|b| b.created),
            sections: bucket.as_ref().map_or(0, |b| b.payload.len()),
            last_invalidate: self.store.read_marker(LAST_INVALIDATE_MARKER)?,
        })
    }
}
