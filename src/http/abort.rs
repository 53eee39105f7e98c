//! Abort signals for in-flight requests.
//!
//! An [`AbortController`] is held by whoever owns a request; the matching
//! [`AbortSignal`] travels with the request into the transport. Aborting is
//! one-way and idempotent.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::error::ApiError;

#[derive(Debug, Default)]
struct AbortState {
  aborted: AtomicBool,
  notify: Notify,
}

/// Owner side of an abort signal.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
  state: Arc<AbortState>,
}

impl AbortController {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get a signal bound to this controller.
  pub fn signal(&self) -> AbortSignal {
    AbortSignal {
      state: Arc::clone(&self.state),
    }
  }

  /// Abort every request holding a signal from this controller.
  pub fn abort(&self) {
    if !self.state.aborted.swap(true, Ordering::SeqCst) {
      self.state.notify.notify_waiters();
    }
  }

  pub fn is_aborted(&self) -> bool {
    self.state.aborted.load(Ordering::SeqCst)
  }
}

/// Request side of an abort signal.
#[derive(Debug, Clone)]
pub struct AbortSignal {
  state: Arc<AbortState>,
}

impl AbortSignal {
  pub fn is_aborted(&self) -> bool {
    self.state.aborted.load(Ordering::SeqCst)
  }

  /// Resolves once the signal is aborted.
  pub async fn aborted(&self) {
    loop {
      // Register before checking the flag so an abort between the two is not missed
      let notified = self.state.notify.notified();
      if self.is_aborted() {
        return;
      }
      notified.await;
    }
  }

  /// Drive `fut` to completion unless the signal fires first.
  pub async fn run<T, F>(&self, fut: F) -> Result<T, ApiError>
  where
    F: Future<Output = Result<T, ApiError>>,
  {
    if self.is_aborted() {
      return Err(ApiError::Cancelled);
    }

    tokio::select! {
      biased;
      _ = self.aborted() => Err(ApiError::Cancelled),
      result = fut => result,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_abort_interrupts_pending_future() {
    let controller = AbortController::new();
    let signal = controller.signal();

    let handle = tokio::spawn(async move {
      signal
        .run(async {
          tokio::time::sleep(Duration::from_secs(30)).await;
          Ok::<_, ApiError>(1)
        })
        .await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.abort();

    let result = handle.await.expect("task panicked");
    assert_eq!(result, Err(ApiError::Cancelled));
  }

  #[tokio::test]
  async fn test_already_aborted_never_polls_future() {
    let controller = AbortController::new();
    controller.abort();

    let polled = std::sync::atomic::AtomicBool::new(false);
    let result: Result<(), ApiError> = controller
      .signal()
      .run(async {
        polled.store(true, Ordering::SeqCst);
        Ok(())
      })
      .await;
    assert!(!polled.load(Ordering::SeqCst));
    assert_eq!(result, Err(ApiError::Cancelled));
  }

  #[tokio::test]
  async fn test_completed_future_wins() {
    let controller = AbortController::new();
    let result = controller.signal().run(async { Ok::<_, ApiError>(7) }).await;
    assert_eq!(result, Ok(7));
    assert!(!controller.is_aborted());
  }

  #[test]
  fn test_abort_is_idempotent() {
    let controller = AbortController::new();
    let signal = controller.signal();
    controller.abort();
    controller.abort();
    assert!(signal.is_aborted());
  }
}
