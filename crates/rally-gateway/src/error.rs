//! Error type for `rally-gateway`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The configured token secret is unusable.
  #[error("invalid token secret: {0}")]
  Secret(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
