//! HTTP collaborator: transport trait, reqwest client and abort signals.

mod abort;
mod error;
mod rest;
#[cfg(test)]
pub mod testing;
mod transport;

pub use abort::{AbortController, AbortSignal};
pub use error::ApiError;
pub use rest::RestClient;
pub use transport::{HttpTransport, RequestOptions};

use url::Url;

/// Build an absolute API path from raw segments, percent-encoding each one.
pub fn join_path(segments: &[&str]) -> String {
  // The host is never used, it only gives `Url` something to hang segments off
  let mut url = match Url::parse("http://api.invalid/") {
    Ok(url) => url,
    Err(_) => return format!("/{}", segments.join("/")),
  };
  if let Ok(mut path) = url.path_segments_mut() {
    path.clear().extend(segments);
  }
  url.path().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_join_path_plain() {
    assert_eq!(join_path(&["users", "42", "support-desk"]), "/users/42/support-desk");
  }

  #[test]
  fn test_join_path_encodes_segments() {
    assert_eq!(
      join_path(&["users", "ana maria/x", "support-desk"]),
      "/users/ana%20maria%2Fx/support-desk"
    );
  }
}
