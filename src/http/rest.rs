use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::ApiError;
use super::transport::{HttpTransport, RequestOptions};
use crate::config::Config;

/// reqwest-backed transport for the agency API.
#[derive(Clone)]
pub struct RestClient {
  client: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl RestClient {
  pub fn new(config: &Config) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url: parse_base_url(&config.api.base_url)?,
      token: Config::get_api_token(),
    })
  }

  fn url(&self, path: &str, opts: &RequestOptions) -> Result<Url, ApiError> {
    let mut url = self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| ApiError::InvalidArgument(format!("bad path {}: {}", path, e)))?;

    if !opts.params.is_empty() {
      url.query_pairs_mut().extend_pairs(opts.params.iter());
    }
    Ok(url)
  }

  async fn send(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
    opts: RequestOptions,
  ) -> Result<Value, ApiError> {
    let url = self.url(path, &opts)?;
    debug!(%method, %url, "sending request");

    let mut request = self.client.request(method, url);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }
    for (name, value) in &opts.headers {
      let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ApiError::InvalidArgument(format!("header {}: {}", name, e)))?;
      let value = HeaderValue::from_str(value)
        .map_err(|e| ApiError::InvalidArgument(format!("header {}: {}", name, e)))?;
      request = request.header(name, value);
    }
    if let Some(body) = body {
      request = request.json(&body);
    }

    let exchange = async move {
      let response = request.send().await?;
      let status = response.status();
      let bytes = response.bytes().await?;

      if !status.is_success() {
        return Err(ApiError::Status {
          status: status.as_u16(),
          message: error_message(&bytes),
        });
      }
      if bytes.is_empty() {
        return Ok(Value::Null);
      }
      Ok(serde_json::from_slice(&bytes)?)
    };

    match opts.signal {
      Some(signal) => signal.run(exchange).await,
      None => exchange.await,
    }
  }
}

#[async_trait]
impl HttpTransport for RestClient {
  async fn get(&self, path: &str, opts: RequestOptions) -> Result<Value, ApiError> {
    self.send(Method::GET, path, None, opts).await
  }

  async fn post(&self, path: &str, body: Value, opts: RequestOptions) -> Result<Value, ApiError> {
    self.send(Method::POST, path, Some(body), opts).await
  }

  async fn patch(&self, path: &str, body: Value, opts: RequestOptions) -> Result<Value, ApiError> {
    self.send(Method::PATCH, path, Some(body), opts).await
  }

  async fn delete(&self, path: &str, opts: RequestOptions) -> Result<Value, ApiError> {
    self.send(Method::DELETE, path, None, opts).await
  }
}

/// Parse the configured base URL, making sure relative joins keep its path.
fn parse_base_url(raw: &str) -> Result<Url> {
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };
  Url::parse(&normalized).map_err(|e| eyre!("Invalid api.base_url {}: {}", raw, e))
}

/// Pull a human readable message out of an error body.
fn error_message(body: &[u8]) -> String {
  if let Ok(value) = serde_json::from_slice::<Value>(body) {
    for key in ["message", "error", "detail"] {
      if let Some(text) = value.get(key).and_then(Value::as_str) {
        return text.to_string();
      }
    }
  }
  String::from_utf8_lossy(body).trim().to_string()
}
