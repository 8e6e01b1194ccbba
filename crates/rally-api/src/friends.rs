//! Handlers for `/friends` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/friends` | Accepted friends, online first |
//! | `GET`    | `/friends/requests` | Incoming pending requests |
//! | `POST`   | `/friends/requests/{id}` | Send a request to user `id` |
//! | `POST`   | `/friends/requests/{id}/accept` | Accept request `id` |
//! | `DELETE` | `/friends/{id}` | Unfriend, decline or cancel |
//! | `GET`    | `/friends/status/{id}` | `{"status": "none"\|"pending_sent"\|...}` |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rally_core::{
  friendship::{FriendRequest, FriendshipStatus},
  store::FriendshipStore,
  user::{Identity, PublicProfile},
};
use serde::Serialize;

use crate::error::ApiError;

/// `GET /friends`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
) -> Result<Json<Vec<PublicProfile>>, ApiError>
where
  S: FriendshipStore,
{
  let friends = store
    .list_friends(me.id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(friends))
}

/// `GET /friends/requests`
pub async fn requests<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
) -> Result<Json<Vec<FriendRequest>>, ApiError>
where
  S: FriendshipStore,
{
  let pending = store
    .pending_requests(me.id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(pending))
}

/// `POST /friends/requests/{id}` where `id` is the addressee.
pub async fn send_request<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(addressee_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FriendshipStore,
{
  let friendship = store
    .send_friend_request(me.id, addressee_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))??;
  Ok((StatusCode::CREATED, Json(friendship)))
}

/// `POST /friends/requests/{id}/accept`
pub async fn accept_request<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(request_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FriendshipStore,
{
  let friendship = store
    .accept_friend_request(request_id, me.id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))??;
  Ok(Json(friendship))
}

/// `DELETE /friends/{id}`
pub async fn remove<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(other_id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: FriendshipStore,
{
  store
    .remove_friendship(me.id, other_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))??;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  pub status: FriendshipStatus,
}

/// `GET /friends/status/{id}`
pub async fn status<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(target_id): Path<i64>,
) -> Result<Json<StatusResponse>, ApiError>
where
  S: FriendshipStore,
{
  let status = store
    .friendship_status(me.id, target_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(StatusResponse { status }))
}
