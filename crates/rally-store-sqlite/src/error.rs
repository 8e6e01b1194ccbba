//! Error type for `rally-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A user referenced by a write does not exist.
  #[error("user not found: {0}")]
  UserNotFound(i64),

  /// A row was written but could not be read back.
  #[error("row {0} vanished after write")]
  MissingRow(i64),
}

impl Error {
  /// Wrap a decode failure raised inside a `Connection::call` closure.
  pub(crate) fn in_call(e: impl Into<Error>) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(e.into()))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
