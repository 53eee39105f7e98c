//! Scripted in-memory transport for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::error::ApiError;
use super::transport::{HttpTransport, RequestOptions};

/// A recorded request.
#[derive(Debug, Clone)]
pub struct Call {
  pub method: &'static str,
  pub path: String,
  pub params: BTreeMap<String, String>,
  pub headers: BTreeMap<String, String>,
  pub body: Option<Value>,
}

#[derive(Clone)]
struct Reply {
  result: Result<Value, ApiError>,
  gate: Option<Arc<Notify>>,
  honor_abort: bool,
}

#[derive(Default)]
struct Script {
  queued: HashMap<(String, String), VecDeque<Reply>>,
  sticky: HashMap<(String, String), Reply>,
  calls: Vec<Call>,
}

/// Transport that replays scripted replies keyed by method and path.
///
/// Queued replies are consumed first; once a route's queue is empty the sticky
/// reply set with [`FakeTransport::respond`] answers every further call.
/// Unscripted routes fail with a 404.
#[derive(Default)]
pub struct FakeTransport {
  script: Mutex<Script>,
}

impl FakeTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Answer every call to the route with `result`.
  pub fn respond(&self, method: &str, path: &str, result: Result<Value, ApiError>) {
    self.lock().sticky.insert(
      key(method, path),
      Reply {
        result,
        gate: None,
        honor_abort: true,
      },
    );
  }

  /// Answer the next call to the route with `result`.
  pub fn enqueue(&self, method: &str, path: &str, result: Result<Value, ApiError>) {
    self.push(method, path, result, None, true);
  }

  /// Answer the next call once the returned gate is notified.
  pub fn enqueue_gated(
    &self,
    method: &str,
    path: &str,
    result: Result<Value, ApiError>,
  ) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    self.push(method, path, result, Some(Arc::clone(&gate)), true);
    gate
  }

  /// Like [`enqueue_gated`](Self::enqueue_gated) but the reply ignores aborts,
  /// as a transport without cancellation support would.
  pub fn enqueue_gated_ignoring_abort(
    &self,
    method: &str,
    path: &str,
    result: Result<Value, ApiError>,
  ) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    self.push(method, path, result, Some(Arc::clone(&gate)), false);
    gate
  }

  pub fn calls(&self) -> Vec<Call> {
    self.lock().calls.clone()
  }

  pub fn calls_to(&self, method: &str, path: &str) -> Vec<Call> {
    self
      .lock()
      .calls
      .iter()
      .filter(|c| c.method == method && c.path == path)
      .cloned()
      .collect()
  }

  pub fn last_call(&self, method: &str, path: &str) -> Option<Call> {
    self.calls_to(method, path).pop()
  }

  fn push(
    &self,
    method: &str,
    path: &str,
    result: Result<Value, ApiError>,
    gate: Option<Arc<Notify>>,
    honor_abort: bool,
  ) {
    self
      .lock()
      .queued
      .entry(key(method, path))
      .or_default()
      .push_back(Reply {
        result,
        gate,
        honor_abort,
      });
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
    self.script.lock().unwrap_or_else(|e| e.into_inner())
  }

  async fn handle(
    &self,
    method: &'static str,
    path: &str,
    body: Option<Value>,
    opts: RequestOptions,
  ) -> Result<Value, ApiError> {
    let reply = {
      let mut script = self.lock();
      script.calls.push(Call {
        method,
        path: path.to_string(),
        params: opts.params.clone(),
        headers: opts.headers.clone(),
        body,
      });
      let route = key(method, path);
      let queued = script.queued.get_mut(&route).and_then(VecDeque::pop_front);
      queued.or_else(|| script.sticky.get(&route).cloned())
    };

    let Some(reply) = reply else {
      return Err(ApiError::Status {
        status: 404,
        message: format!("no scripted reply for {} {}", method, path),
      });
    };

    let wait = async {
      if let Some(gate) = &reply.gate {
        gate.notified().await;
      }
      reply.result.clone()
    };

    match (&opts.signal, reply.honor_abort) {
      (Some(signal), true) => signal.run(wait).await,
      _ => wait.await,
    }
  }
}

fn key(method: &str, path: &str) -> (String, String) {
  (method.to_string(), path.to_string())
}

#[async_trait]
impl HttpTransport for FakeTransport {
  async fn get(&self, path: &str, opts: RequestOptions) -> Result<Value, ApiError> {
    self.handle("GET", path, None, opts).await
  }

  async fn post(&self, path: &str, body: Value, opts: RequestOptions) -> Result<Value, ApiError> {
    self.handle("POST", path, Some(body), opts).await
  }

  async fn patch(&self, path: &str, body: Value, opts: RequestOptions) -> Result<Value, ApiError> {
    self.handle("PATCH", path, Some(body), opts).await
  }

  async fn delete(&self, path: &str, opts: RequestOptions) -> Result<Value, ApiError> {
    self.handle("DELETE", path, None, opts).await
  }
}
