use thiserror::Error;

/// Errors raised by an [`HttpTransport`](super::HttpTransport).
///
/// `Cancelled` is kept apart from every other failure so callers can tell
/// "the owner went away" from "the request failed".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
  #[error("request was cancelled")]
  Cancelled,

  #[error("invalid request: {0}")]
  InvalidArgument(String),

  #[error("API error: {status} - {message}")]
  Status { status: u16, message: String },

  #[error("network error: {0}")]
  Network(String),

  #[error("failed to decode response: {0}")]
  Decode(String),
}

impl ApiError {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, ApiError::Cancelled)
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::Decode(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_cancelled_is_cancelled() {
    assert!(ApiError::Cancelled.is_cancelled());
    assert!(!ApiError::Network("reset".into()).is_cancelled());
    assert!(!ApiError::Status {
      status: 499,
      message: "client closed".into()
    }
    .is_cancelled());
  }

  #[test]
  fn test_status_display() {
    let err = ApiError::Status {
      status: 503,
      message: "maintenance".into(),
    };
    assert_eq!(err.to_string(), "API error: 503 - maintenance");
  }
}
