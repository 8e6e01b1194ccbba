//! Error types for `rally-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown game status: {0:?}")]
  UnknownGameStatus(String),

  #[error("unknown symbol: {0:?}")]
  UnknownSymbol(String),

  #[error("unknown friendship state: {0:?}")]
  UnknownFriendshipState(String),

  #[error("board must have {expected} cells, found {found}")]
  BoardLength { expected: usize, found: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
