//! Cache store trait and in-memory implementation.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A cached document.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub data: Value,
  /// When the entry was written
  pub timestamp: DateTime<Utc>,
  /// After this instant the entry only serves stale reads
  pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }

  pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
    now - self.timestamp
  }
}

/// Trait for TTL-bound key/value cache backends.
///
/// Writes are last-write-wins; each key is expected to have a single writer.
pub trait CacheStore: Send + Sync {
  /// Read an entry. Expired entries are only returned when `allow_expired` is set.
  fn read(&self, key: &str, allow_expired: bool) -> Option<CacheEntry>;

  /// Store `data` under `key`, fresh for `ttl`.
  fn write(&self, key: &str, data: Value, ttl: Duration);

  /// Drop the entry for `key`, if any.
  fn remove(&self, key: &str);
}

/// Process-local cache store.
///
/// Expired entries are kept until overwritten or removed so they can still
/// serve as a stale fallback.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    // A panic mid-insert cannot leave a HashMap entry half written
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl CacheStore for MemoryStore {
  fn read(&self, key: &str, allow_expired: bool) -> Option<CacheEntry> {
    let entries = self.lock();
    let entry = entries.get(key)?;
    if !allow_expired && entry.is_expired_at(Utc::now()) {
      return None;
    }
    Some(entry.clone())
  }

  fn write(&self, key: &str, data: Value, ttl: Duration) {
    let timestamp = Utc::now();
    self.lock().insert(
      key.to_string(),
      CacheEntry {
        data,
        timestamp,
        expires_at: timestamp
          .checked_add_signed(ttl)
          .unwrap_or(DateTime::<Utc>::MAX_UTC),
      },
    );
  }

  fn remove(&self, key: &str) {
    self.lock().remove(key);
  }
}
