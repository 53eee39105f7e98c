use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use super::abort::AbortSignal;
use super::error::ApiError;

/// Per-request options shared by every verb.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
  pub signal: Option<AbortSignal>,
  pub headers: BTreeMap<String, String>,
  pub params: BTreeMap<String, String>,
}

/// JSON-over-HTTP collaborator used by the support desk and escrow layers.
///
/// Implementations must honour `RequestOptions::signal` and report an aborted
/// request as [`ApiError::Cancelled`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
  async fn get(&self, path: &str, opts: RequestOptions) -> Result<Value, ApiError>;

  async fn post(&self, path: &str, body: Value, opts: RequestOptions) -> Result<Value, ApiError>;

  async fn patch(&self, path: &str, body: Value, opts: RequestOptions) -> Result<Value, ApiError>;

  async fn delete(&self, path: &str, opts: RequestOptions) -> Result<Value, ApiError>;
}
