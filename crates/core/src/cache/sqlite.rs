//! SQLite-backed cache store.
//!
//! Payloads are stored as JSON so a cached directory survives daemon
//! restarts and is visible to the CLI.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{schema, CacheBucket, CacheStore};
use crate::errors::CacheError;

/// A [`CacheStore`] over a single SQLite connection in WAL mode.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `path` and run migrations.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening cache database");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        schema::run_migrations(&conn)?;

        debug!("cache database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory cache database.
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned mutex.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("cache database mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| CacheError::InvalidTimestamp(value.to_string()))
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, key: &str) -> Result<Option<CacheBucket>, CacheError> {
        let row: Option<(String, String, String)> = self
            .conn()
            .query_row(
                "SELECT tag, created_at, payload FROM cache_buckets WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((tag, created_at, payload)) = row else {
            return Ok(None);
        };
        Ok(Some(CacheBucket {
            created: parse_timestamp(&created_at)?,
            payload: serde_json::from_str(&payload)?,
            tag,
        }))
    }

    fn set(&self, key: &str, bucket: &CacheBucket) -> Result<(), CacheError> {
        let payload = serde_json::to_string(&bucket.payload)?;
        self.conn().execute(
            "INSERT INTO cache_buckets (key, tag, created_at, payload) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET tag = excluded.tag,
                 created_at = excluded.created_at, payload = excluded.payload",
            params![key, bucket.tag, bucket.created.to_rfc3339(), payload],
        )?;
        debug!(key, bytes = payload.len(), "stored cache bucket");
        Ok(())
    }

    fn invalidate_tag(&self, tag: &str) -> Result<usize, CacheError> {
        let removed = self
            .conn()
            .execute("DELETE FROM cache_buckets WHERE tag = ?1", params![tag])?;
        Ok(removed)
    }

    fn read_marker(&self, name: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        let value: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM kv_state WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        value.as_deref().map(parse_timestamp).transpose()
    }

    fn write_marker(&self, name: &str, at: DateTime<Utc>) -> Result<(), CacheError> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO kv_state (name, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![name, at.to_rfc3339(), now],
        )?;
        Ok(())
    }
}
