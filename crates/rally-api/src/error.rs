//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use rally_core::{
  friendship::FriendshipRejection,
  game::{
    GameAccessRejection, GameCreateRejection, JoinRejection, MoveFailure,
    MoveRejection,
  },
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// A refused move; the body carries the machine-readable reason code.
  #[error("move rejected: {0}")]
  Move(MoveFailure),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Move(failure) => {
        let status = match failure {
          MoveFailure::GameNotFound => StatusCode::NOT_FOUND,
          MoveFailure::Rejected(MoveRejection::NotInGame) => StatusCode::FORBIDDEN,
          MoveFailure::Rejected(_) => StatusCode::BAD_REQUEST,
        };
        let body = json!({ "error": failure.to_string(), "code": failure.code() });
        return (status, Json(body)).into_response();
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

// ─── Rejection mapping ───────────────────────────────────────────────────────

impl From<FriendshipRejection> for ApiError {
  fn from(r: FriendshipRejection) -> Self {
    let m = r.to_string();
    match r {
      FriendshipRejection::SelfRequest | FriendshipRejection::NotPending => {
        ApiError::BadRequest(m)
      }
      FriendshipRejection::UserNotFound
      | FriendshipRejection::RequestNotFound
      | FriendshipRejection::FriendshipNotFound => ApiError::NotFound(m),
      FriendshipRejection::AlreadyFriends
      | FriendshipRejection::RequestPending => ApiError::Conflict(m),
      FriendshipRejection::NotAddressee => ApiError::Forbidden(m),
    }
  }
}

impl From<GameCreateRejection> for ApiError {
  fn from(r: GameCreateRejection) -> Self {
    let m = r.to_string();
    match r {
      GameCreateRejection::SelfPlay => ApiError::BadRequest(m),
      GameCreateRejection::PlayerNotFound => ApiError::NotFound(m),
      GameCreateRejection::NotFriends => ApiError::Forbidden(m),
    }
  }
}

impl From<JoinRejection> for ApiError {
  fn from(r: JoinRejection) -> Self {
    let m = r.to_string();
    match r {
      JoinRejection::GameNotFound => ApiError::NotFound(m),
      JoinRejection::NotWaiting => ApiError::Conflict(m),
      JoinRejection::OwnGame => ApiError::BadRequest(m),
    }
  }
}

impl From<GameAccessRejection> for ApiError {
  fn from(r: GameAccessRejection) -> Self {
    let m = r.to_string();
    match r {
      GameAccessRejection::GameNotFound => ApiError::NotFound(m),
      GameAccessRejection::AccessDenied => ApiError::Forbidden(m),
    }
  }
}

impl From<MoveFailure> for ApiError {
  fn from(f: MoveFailure) -> Self { ApiError::Move(f) }
}
