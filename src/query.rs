//! Latest-request tracking for async data slices.
//!
//! A [`LatestRequest`] owns at most one authoritative in-flight fetch. Starting
//! a new fetch aborts the previous one and drops its result channel, and every
//! result is checked against the current generation and abort signal before
//! it is handed back, so a superseded request can never write state.
//!
//! # Example
//!
//! ```ignore
//! let mut accounts: LatestRequest<Page<Account>, ApiError> = LatestRequest::new();
//! let api = api.clone();
//! accounts.start(move |signal| async move { api.list_accounts(&filters, &page, signal).await });
//!
//! // In event loop tick
//! if let Some(result) = accounts.poll() {
//!     // apply result, trigger re-render
//! }
//! ```

use std::future::Future;
use tokio::sync::mpsc;

use crate::http::{AbortController, AbortSignal, ApiError};

/// Errors that can report a cancellation, which is dropped silently.
pub trait Cancellation {
  fn is_cancelled(&self) -> bool;
}

impl Cancellation for ApiError {
  fn is_cancelled(&self) -> bool {
    ApiError::is_cancelled(self)
  }
}

type Outcome<T, E> = (u64, Result<T, E>);

/// Tracks the single authoritative fetch for one slice of state.
pub struct LatestRequest<T, E> {
  generation: u64,
  controller: Option<AbortController>,
  receiver: Option<mpsc::UnboundedReceiver<Outcome<T, E>>>,
}

impl<T, E> Default for LatestRequest<T, E> {
  fn default() -> Self {
    Self {
      generation: 0,
      controller: None,
      receiver: None,
    }
  }
}

impl<T, E> LatestRequest<T, E>
where
  T: Send + 'static,
  E: Cancellation + Send + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Start a fetch, superseding any pending one.
  ///
  /// `fetcher` receives the abort signal of the new request. Must be called
  /// from within a tokio runtime. Returns the new generation.
  pub fn start<F, Fut>(&mut self, fetcher: F) -> u64
  where
    F: FnOnce(AbortSignal) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    self.cancel();
    self.generation += 1;

    let controller = AbortController::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let generation = self.generation;
    let future = fetcher(controller.signal());

    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the request may have been superseded
      let _ = tx.send((generation, result));
    });

    self.controller = Some(controller);
    self.receiver = Some(rx);
    generation
  }

  /// Abort the pending fetch, if any. Its result will never be delivered.
  pub fn cancel(&mut self) {
    if let Some(controller) = self.controller.take() {
      controller.abort();
    }
    self.receiver = None;
  }

  pub fn is_pending(&self) -> bool {
    self.receiver.is_some()
  }

  #[cfg(test)]
  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// Non-blocking check for a finished fetch.
  ///
  /// Returns `None` while pending, when nothing is in flight, or when the
  /// result was a cancellation.
  pub fn poll(&mut self) -> Option<Result<T, E>> {
    let receiver = self.receiver.as_mut()?;
    match receiver.try_recv() {
      Ok((generation, result)) => self.accept(generation, result),
      Err(mpsc::error::TryRecvError::Empty) => None,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Task died without reporting
        self.finish();
        None
      }
    }
  }

  /// Wait for the pending fetch to finish.
  pub async fn settle(&mut self) -> Option<Result<T, E>> {
    let receiver = self.receiver.as_mut()?;
    match receiver.recv().await {
      Some((generation, result)) => self.accept(generation, result),
      None => {
        self.finish();
        None
      }
    }
  }

  fn accept(&mut self, generation: u64, result: Result<T, E>) -> Option<Result<T, E>> {
    let current = generation == self.generation
      && self
        .controller
        .as_ref()
        .is_some_and(|controller| !controller.is_aborted());
    self.finish();

    if !current {
      return None;
    }
    match result {
      Err(e) if e.is_cancelled() => None,
      other => Some(other),
    }
  }

  fn finish(&mut self) {
    self.controller = None;
    self.receiver = None;
  }
}

impl<T, E> Drop for LatestRequest<T, E> {
  fn drop(&mut self) {
    if let Some(controller) = self.controller.take() {
      controller.abort();
    }
  }
}

impl<T, E> std::fmt::Debug for LatestRequest<T, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LatestRequest")
      .field("generation", &self.generation)
      .field("pending", &self.receiver.is_some())
      .finish_non_exhaustive()
  }
}
