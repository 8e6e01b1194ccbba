//! Handlers for `/games` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/games` | Body: `{"opponentId": 7}` or `{}` for an open game |
//! | `GET`  | `/games/{id}` | Participants only |
//! | `POST` | `/games/{id}/join` | Take the open seat |
//! | `POST` | `/games/{id}/moves` | Body: `{"cellIndex": 4}` |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rally_core::{
  game::{CellIndex, Game, GameView, MoveResult},
  store::GameStore,
  user::Identity,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub opponent_id: Option<i64>,
}

/// `POST /games`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GameStore,
{
  let game = store
    .create_game(me.id, body.opponent_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))??;
  Ok((StatusCode::CREATED, Json(game)))
}

// ─── Read / join ─────────────────────────────────────────────────────────────

/// `GET /games/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(game_id): Path<i64>,
) -> Result<Json<GameView>, ApiError>
where
  S: GameStore,
{
  let view = store
    .get_game(game_id, me.id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))??;
  Ok(Json(view))
}

/// `POST /games/{id}/join`
pub async fn join<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(game_id): Path<i64>,
) -> Result<Json<Game>, ApiError>
where
  S: GameStore,
{
  let game = store
    .join_game(game_id, me.id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))??;
  Ok(Json(game))
}

// ─── Moves ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveBody {
  /// Anything that is not an integer is refused as `INVALID_CELL`.
  #[serde(default)]
  pub cell_index: CellIndex,
}

/// The game after an accepted move, with the winning line when there is one.
#[derive(Debug, Serialize)]
pub struct MoveResponse {
  pub game: Game,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line: Option<[usize; 3]>,
}

impl From<MoveResult> for MoveResponse {
  fn from(r: MoveResult) -> Self {
    Self {
      line: r.outcome.line(),
      game: r.game,
    }
  }
}

/// `POST /games/{id}/moves`
pub async fn make_move<S>(
  State(store): State<Arc<S>>,
  Extension(me): Extension<Identity>,
  Path(game_id): Path<i64>,
  Json(body): Json<MoveBody>,
) -> Result<Json<MoveResponse>, ApiError>
where
  S: GameStore,
{
  let result = store
    .make_move(game_id, body.cell_index, me.id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))??;
  Ok(Json(MoveResponse::from(result)))
}
