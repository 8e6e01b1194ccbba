//! Handlers for `/messages` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/messages/conversations` | Latest message + unread count per counterpart |
//! | `GET`   | `/messages/{id}` | `?limit=&before=`; friends only; marks fetched messages read |
//! | `PATCH` | `/messages/{id}/read` | Returns `{"count": n}` |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
};
use rally_core::{
  message::{ConversationSummary, HistoryPage, HistoryQuery},
  store::{FriendshipStore, MessageStore},
  user::Identity,
};
use serde::Serialize;

use crate::error::ApiError;

// ─── Conversations ───────────────────────────────────────────────────────────

/// `GET /messages/conversations`
pub async fn conversations<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError>
where
  S: MessageStore,
{
  let summaries = store
    .conversation_summaries(me.id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(summaries))
}

// ─── History ─────────────────────────────────────────────────────────────────

/// `GET /messages/{id}[?limit=<n>&before=<message id>]`
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(counterpart_id): Path<i64>,
  Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError>
where
  S: MessageStore + FriendshipStore,
{
  if counterpart_id == me.id {
    return Err(ApiError::BadRequest(
      "cannot fetch a conversation with yourself".into(),
    ));
  }
  let friends = store
    .are_friends(me.id, counterpart_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if !friends {
    return Err(ApiError::Forbidden(
      "you can only view messages with friends".into(),
    ));
  }

  let page = store
    .history(me.id, counterpart_id, query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(page))
}

// ─── Mark read ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
  pub count: u64,
}

/// `PATCH /messages/{id}/read`
pub async fn mark_read<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(counterpart_id): Path<i64>,
) -> Result<Json<MarkReadResponse>, ApiError>
where
  S: MessageStore,
{
  let count = store
    .mark_read(me.id, counterpart_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(MarkReadResponse { count }))
}
