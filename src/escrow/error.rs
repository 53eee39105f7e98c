use thiserror::Error;

use crate::http::ApiError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EscrowError {
  /// Bad form input, raised before any request is sent.
  #[error("{0}")]
  Validation(String),

  #[error(transparent)]
  Api(#[from] ApiError),
}
