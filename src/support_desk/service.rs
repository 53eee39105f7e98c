//! Read-through snapshot cache with stale-on-error fallback.

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::config::{duration_secs, SupportDeskConfig};
use crate::http::{join_path, AbortSignal, ApiError, HttpTransport, RequestOptions};
use crate::query::Cancellation;

/// Query hint asking the backend for a cacheable response.
const CACHE_HINT_PARAM: &str = "cache";
const CACHE_HINT_VALUE: &str = "prefer";

#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error(transparent)]
  Api(#[from] ApiError),

  /// The backend kept failing past the staleness bounds.
  #[error("support desk data is {age_secs}s old after {consecutive} stale reads")]
  StaleLimitExceeded {
    consecutive: u32,
    age_secs: i64,
    #[source]
    source: ApiError,
  },
}

impl Cancellation for SnapshotError {
  fn is_cancelled(&self) -> bool {
    matches!(self, SnapshotError::Api(e) if e.is_cancelled())
  }
}

/// A support desk document and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
  pub data: Value,
  pub cached_at: DateTime<Utc>,
  pub from_cache: bool,
  pub stale: bool,
}

/// Options for [`SnapshotService::get_snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
  pub force_refresh: bool,
  pub allow_stale_on_error: bool,
  pub signal: Option<AbortSignal>,
  pub headers: BTreeMap<String, String>,
  pub params: BTreeMap<String, String>,
}

impl Default for SnapshotOptions {
  fn default() -> Self {
    Self {
      force_refresh: false,
      allow_stale_on_error: true,
      signal: None,
      headers: BTreeMap::new(),
      params: BTreeMap::new(),
    }
  }
}

#[cfg(test)]
impl SnapshotOptions {
  pub fn forced() -> Self {
    Self {
      force_refresh: true,
      ..Self::default()
    }
  }
}

/// Cache policy for snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotPolicy {
  pub namespace: String,
  pub ttl: Duration,
  /// Stale serves allowed in a row before failing hard
  pub max_stale_serves: u32,
  /// Oldest entry that may still be served as a fallback
  pub max_stale_age: Duration,
}

impl Default for SnapshotPolicy {
  fn default() -> Self {
    Self {
      namespace: "support-desk".to_string(),
      ttl: Duration::minutes(3),
      max_stale_serves: 5,
      max_stale_age: Duration::minutes(30),
    }
  }
}

impl From<&SupportDeskConfig> for SnapshotPolicy {
  fn from(config: &SupportDeskConfig) -> Self {
    Self {
      namespace: config.namespace.clone(),
      ttl: duration_secs(config.ttl_secs),
      max_stale_serves: config.max_stale_serves,
      max_stale_age: duration_secs(config.max_stale_age_secs),
    }
  }
}

/// Fetches per-user support desk snapshots through a shared cache.
pub struct SnapshotService {
  transport: Arc<dyn HttpTransport>,
  cache: Arc<dyn CacheStore>,
  policy: SnapshotPolicy,
  /// Consecutive stale serves per cache key
  stale_serves: Mutex<HashMap<String, u32>>,
}

impl SnapshotService {
  pub fn new(
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn CacheStore>,
    policy: SnapshotPolicy,
  ) -> Self {
    Self {
      transport,
      cache,
      policy,
      stale_serves: Mutex::new(HashMap::new()),
    }
  }

  /// Get the snapshot for `user_id`.
  ///
  /// 1. Unless forced, return a fresh cache entry without touching the network
  /// 2. Otherwise GET the snapshot and cache it
  /// 3. On failure (not cancellation), fall back to the cached entry even if
  ///    expired, within the staleness bounds
  pub async fn get_snapshot(
    &self,
    user_id: &str,
    options: SnapshotOptions,
  ) -> Result<Snapshot, SnapshotError> {
    let key = self.cache_key(user_id)?;
    validate_headers(&options.headers)?;
    validate_params(&options.params)?;

    if !options.force_refresh {
      if let Some(entry) = self.cache.read(&key, false) {
        debug!(%key, "support desk snapshot served from cache");
        return Ok(Snapshot {
          data: entry.data,
          cached_at: entry.timestamp,
          from_cache: true,
          stale: false,
        });
      }
    }

    let mut params = options.params;
    if !options.force_refresh {
      params
        .entry(CACHE_HINT_PARAM.to_string())
        .or_insert_with(|| CACHE_HINT_VALUE.to_string());
    }
    let request = RequestOptions {
      signal: options.signal,
      headers: options.headers,
      params,
    };
    let path = join_path(&["users", user_id.trim(), "support-desk"]);

    match self.transport.get(&path, request).await {
      Ok(data) => {
        self.cache.write(&key, data.clone(), self.policy.ttl);
        self.reset_stale_serves(&key);
        debug!(%key, "support desk snapshot fetched");
        Ok(Snapshot {
          data,
          cached_at: Utc::now(),
          from_cache: false,
          stale: false,
        })
      }
      Err(err) if err.is_cancelled() => Err(err.into()),
      Err(err) => {
        if options.allow_stale_on_error {
          if let Some(entry) = self.cache.read(&key, true) {
            return self.serve_stale(&key, entry, err);
          }
        }
        warn!(%key, error = %err, "support desk snapshot fetch failed");
        Err(err.into())
      }
    }
  }

  /// Drop the cached snapshot for `user_id`.
  pub fn invalidate_snapshot(&self, user_id: &str) -> Result<(), SnapshotError> {
    let key = self.cache_key(user_id)?;
    self.cache.remove(&key);
    self.reset_stale_serves(&key);
    Ok(())
  }

  fn cache_key(&self, user_id: &str) -> Result<String, SnapshotError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
      return Err(SnapshotError::InvalidArgument(
        "a user id is required to load the support desk".to_string(),
      ));
    }
    Ok(format!("{}:{}", self.policy.namespace, user_id))
  }

  fn serve_stale(
    &self,
    key: &str,
    entry: CacheEntry,
    source: ApiError,
  ) -> Result<Snapshot, SnapshotError> {
    let consecutive = {
      let mut serves = self.stale_serves.lock().unwrap_or_else(|e| e.into_inner());
      let count = serves.entry(key.to_string()).or_insert(0);
      *count += 1;
      *count
    };
    let age = entry.age_at(Utc::now());

    if consecutive > self.policy.max_stale_serves || age > self.policy.max_stale_age {
      warn!(%key, consecutive, age_secs = age.num_seconds(), error = %source, "support desk staleness limit exceeded");
      return Err(SnapshotError::StaleLimitExceeded {
        consecutive,
        age_secs: age.num_seconds(),
        source,
      });
    }

    warn!(%key, consecutive, error = %source, "serving stale support desk snapshot");
    Ok(Snapshot {
      data: entry.data,
      cached_at: entry.timestamp,
      from_cache: true,
      stale: true,
    })
  }

  fn reset_stale_serves(&self, key: &str) {
    self
      .stale_serves
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(key);
  }
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), SnapshotError> {
  for (name, value) in headers {
    HeaderName::from_bytes(name.as_bytes())
      .map_err(|_| SnapshotError::InvalidArgument(format!("invalid header name {:?}", name)))?;
    HeaderValue::from_str(value)
      .map_err(|_| SnapshotError::InvalidArgument(format!("invalid value for header {}", name)))?;
  }
  Ok(())
}

fn validate_params(params: &BTreeMap<String, String>) -> Result<(), SnapshotError> {
  if params.keys().any(|k| k.trim().is_empty()) {
    return Err(SnapshotError::InvalidArgument(
      "query parameter names must not be empty".to_string(),
    ));
  }
  Ok(())
}
