use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::warn;

use super::service::{Snapshot, SnapshotError, SnapshotOptions, SnapshotService};
use super::types::SupportDesk;
use crate::query::LatestRequest;

/// How long to wait before retrying while showing stale data.
const STALE_RETRY_INTERVAL_SECS: i64 = 30;

/// View state for the support desk panel.
///
/// The last good snapshot stays visible while a reload is in flight or after
/// a reload fails; only a successful load replaces it.
pub struct SupportDeskPanel {
  service: Arc<SnapshotService>,
  user_id: String,
  request: LatestRequest<Snapshot, SnapshotError>,
  snapshot: Option<Snapshot>,
  desk: SupportDesk,
  loading: bool,
  error: Option<String>,
  last_attempt: Option<DateTime<Utc>>,
}

impl SupportDeskPanel {
  /// Create the panel and start the initial load.
  pub fn mount(service: Arc<SnapshotService>, user_id: String) -> Self {
    let mut panel = Self {
      service,
      user_id,
      request: LatestRequest::new(),
      snapshot: None,
      desk: SupportDesk::default(),
      loading: false,
      error: None,
      last_attempt: None,
    };
    panel.load(false);
    panel
  }

  /// Load the snapshot, bypassing the cache when `force` is set.
  pub fn load(&mut self, force: bool) {
    let service = Arc::clone(&self.service);
    let user_id = self.user_id.clone();

    self.loading = true;
    self.last_attempt = Some(Utc::now());
    self.request.start(move |signal| async move {
      let options = SnapshotOptions {
        force_refresh: force,
        signal: Some(signal),
        ..SnapshotOptions::default()
      };
      service.get_snapshot(&user_id, options).await
    });
  }

  /// Drop the cached snapshot and fetch a new one.
  ///
  /// Unlike a forced load this also discards the stale fallback, so a failing
  /// backend surfaces its error instead of old data.
  pub fn clear_cache(&mut self) {
    if let Err(e) = self.service.invalidate_snapshot(&self.user_id) {
      warn!(error = %e, "failed to invalidate support desk snapshot");
      self.error = Some(e.to_string());
      return;
    }
    self.load(false);
  }

  /// Apply a finished load, if any. Returns true when state changed.
  pub fn poll(&mut self) -> bool {
    match self.request.poll() {
      Some(result) => {
        self.apply(result);
        true
      }
      None => false,
    }
  }

  /// Wait for the pending load and apply it.
  pub async fn settle(&mut self) {
    if let Some(result) = self.request.settle().await {
      self.apply(result);
    }
  }

  /// Poll, and kick off a background retry while serving stale data.
  pub fn tick(&mut self) -> bool {
    let changed = self.poll();
    if self.retry_due(Utc::now()) {
      self.load(true);
    }
    changed
  }

  fn retry_due(&self, now: DateTime<Utc>) -> bool {
    let stale = self.snapshot.as_ref().is_some_and(|s| s.stale);
    let waited = self
      .last_attempt
      .map(|at| now - at >= Duration::seconds(STALE_RETRY_INTERVAL_SECS))
      .unwrap_or(true);
    stale && !self.request.is_pending() && waited
  }

  fn apply(&mut self, result: Result<Snapshot, SnapshotError>) {
    self.loading = false;
    match result {
      Ok(snapshot) => {
        self.desk = SupportDesk::from_value(&snapshot.data).unwrap_or_else(|e| {
          warn!(error = %e, "support desk document did not match the expected shape");
          SupportDesk::default()
        });
        self.snapshot = Some(snapshot);
        self.error = None;
      }
      Err(e) => {
        self.error = Some(e.to_string());
      }
    }
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn snapshot(&self) -> Option<&Snapshot> {
    self.snapshot.as_ref()
  }

  pub fn desk(&self) -> &SupportDesk {
    &self.desk
  }

  pub fn user_id(&self) -> &str {
    &self.user_id
  }

  /// Note shown above the panel when the data on screen is not current.
  pub fn status_note(&self) -> Option<String> {
    let snapshot = self.snapshot.as_ref()?;
    if !snapshot.stale {
      return None;
    }
    Some(format!(
      "Showing cached data from {}. Retrying in the background.",
      snapshot
        .cached_at
        .with_timezone(&chrono::Local)
        .format("%H:%M")
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStore;
  use crate::http::testing::FakeTransport;
  use crate::http::ApiError;
  use crate::support_desk::SnapshotPolicy;
  use serde_json::json;

  const PATH: &str = "/users/42/support-desk";

  fn panel_with(fake: &Arc<FakeTransport>, policy: SnapshotPolicy) -> SupportDeskPanel {
    let service = SnapshotService::new(fake.clone(), Arc::new(MemoryStore::new()), policy);
    SupportDeskPanel::mount(Arc::new(service), "42".to_string())
  }

  #[tokio::test]
  async fn test_mount_loads_snapshot() {
    let fake = FakeTransport::new();
    fake.respond(
      "GET",
      PATH,
      Ok(json!({"supportCases": [{"id": 1, "subject": "Refund", "status": "open"}]})),
    );
    let mut panel = panel_with(&fake, SnapshotPolicy::default());
    assert!(panel.is_loading());

    panel.settle().await;
    assert!(!panel.is_loading());
    assert_eq!(panel.desk().open_cases().len(), 1);
    assert!(panel.status_note().is_none());
  }

  #[tokio::test]
  async fn test_failed_reload_keeps_previous_snapshot() {
    let fake = FakeTransport::new();
    fake.enqueue("GET", PATH, Ok(json!({"metrics": {"openCases": 4}})));
    fake.enqueue(
      "GET",
      PATH,
      Err(ApiError::Network("connection refused".into())),
    );
    let policy = SnapshotPolicy {
      max_stale_serves: 0,
      ..SnapshotPolicy::default()
    };
    let mut panel = panel_with(&fake, policy);
    panel.settle().await;

    panel.load(true);
    assert!(panel.is_loading());
    assert_eq!(panel.desk().metrics.open_cases, 4);

    panel.settle().await;
    assert!(panel.error().is_some());
    assert_eq!(panel.desk().metrics.open_cases, 4);
  }

  #[tokio::test]
  async fn test_clear_cache_refetches_without_fallback() {
    let fake = FakeTransport::new();
    fake.enqueue("GET", PATH, Ok(json!({"metrics": {"openCases": 4}})));
    fake.enqueue("GET", PATH, Err(ApiError::Network("timeout".into())));
    let mut panel = panel_with(&fake, SnapshotPolicy::default());
    panel.settle().await;

    panel.clear_cache();
    panel.settle().await;

    assert_eq!(fake.calls_to("GET", PATH).len(), 2);
    assert!(panel.error().is_some());
    // The last good snapshot stays on screen
    assert_eq!(panel.desk().metrics.open_cases, 4);
  }

  #[tokio::test]
  async fn test_stale_snapshot_shows_note() {
    let fake = FakeTransport::new();
    fake.enqueue("GET", PATH, Ok(json!({})));
    fake.enqueue("GET", PATH, Err(ApiError::Network("timeout".into())));
    let mut panel = panel_with(&fake, SnapshotPolicy::default());
    panel.settle().await;

    panel.load(true);
    panel.settle().await;
    assert!(panel.snapshot().is_some_and(|s| s.stale));
    assert!(panel.error().is_none());
    assert!(panel.status_note().is_some());
  }

  #[tokio::test]
  async fn test_retry_due_only_when_stale_and_idle() {
    let fake = FakeTransport::new();
    fake.enqueue("GET", PATH, Ok(json!({})));
    fake.enqueue("GET", PATH, Err(ApiError::Network("timeout".into())));
    let mut panel = panel_with(&fake, SnapshotPolicy::default());
    panel.settle().await;

    let later = Utc::now() + Duration::seconds(STALE_RETRY_INTERVAL_SECS + 1);
    assert!(!panel.retry_due(later));

    panel.load(true);
    panel.settle().await;
    assert!(!panel.retry_due(Utc::now()));
    assert!(panel.retry_due(later));
  }
}
