//! [`GameStore`] for [`SqliteStore`]: game creation, joining and the move
//! coordinator.
//!
//! Moves and joins read the game row, decide with the pure engine, and write
//! the result back inside one IMMEDIATE transaction. Two submissions on the
//! same game therefore never decide against the same board: the second one
//! reads the state the first one committed.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use rally_core::{
  game::{
    BOARD_SIZE, CellIndex, Game, GameAccessRejection, GameCreateRejection, GameStatus,
    GameView, JoinRejection, MoveFailure, Symbol, empty_board, play_move,
  },
  store::{GameStore, MoveOutcome},
};

use crate::{
  Error, Result,
  encode::{GAME_COLUMNS, RawGame, encode_board, encode_dt},
  friendships::accepted_between,
  store::{SqliteStore, user_exists},
};

fn select_game(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawGame>> {
  conn
    .query_row(
      &format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?1"),
      rusqlite::params![id],
      RawGame::from_row,
    )
    .optional()
}

/// Load and decode a game on the connection thread.
fn load_game(
  conn: &rusqlite::Connection,
  id: i64,
) -> tokio_rusqlite::Result<Option<Game>> {
  select_game(conn, id)?
    .map(RawGame::into_game)
    .transpose()
    .map_err(Error::in_call)
}

/// Persist every mutable column of `game`.
fn write_game(conn: &rusqlite::Connection, game: &Game) -> tokio_rusqlite::Result<()> {
  let board = encode_board(&game.board_state).map_err(Error::in_call)?;
  conn.execute(
    "UPDATE games SET
       player2_id   = ?2,
       board_state  = ?3,
       current_turn = ?4,
       status       = ?5,
       winner_id    = ?6,
       started_at   = ?7,
       finished_at  = ?8
     WHERE id = ?1",
    rusqlite::params![
      game.id,
      game.player2_id,
      board,
      game.current_turn.as_str(),
      game.status.as_str(),
      game.winner_id,
      game.started_at.map(encode_dt),
      game.finished_at.map(encode_dt),
    ],
  )?;
  Ok(())
}

impl GameStore for SqliteStore {
  async fn create_game(
    &self,
    player1_id: i64,
    player2_id: Option<i64>,
  ) -> Result<Result<Game, GameCreateRejection>> {
    if player2_id == Some(player1_id) {
      return Ok(Err(GameCreateRejection::SelfPlay));
    }
    let now: DateTime<Utc> = Utc::now();
    let created_at = encode_dt(now);
    let board = encode_board(&empty_board())?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !user_exists(&tx, player1_id)? {
          return Err(Error::in_call(Error::UserNotFound(player1_id)));
        }
        let (status, started_at) = match player2_id {
          Some(opponent) => {
            if !user_exists(&tx, opponent)? {
              return Ok(Err(GameCreateRejection::PlayerNotFound));
            }
            if !accepted_between(&tx, player1_id, opponent)? {
              return Ok(Err(GameCreateRejection::NotFriends));
            }
            (GameStatus::InProgress, Some(created_at.clone()))
          }
          None => (GameStatus::Waiting, None),
        };

        tx.execute(
          "INSERT INTO games (player1_id, player2_id, board_state, board_size,
             current_turn, status, winner_id, player1_symbol, player2_symbol,
             created_at, started_at, finished_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9, ?10, NULL)",
          rusqlite::params![
            player1_id,
            player2_id,
            board,
            BOARD_SIZE,
            Symbol::X.as_str(),
            status.as_str(),
            Symbol::X.as_str(),
            Symbol::O.as_str(),
            created_at,
            started_at,
          ],
        )?;
        let id = tx.last_insert_rowid();
        let game = load_game(&tx, id)?
          .ok_or_else(|| Error::in_call(Error::MissingRow(id)))?;
        tx.commit()?;
        Ok(Ok(game))
      })
      .await?;

    if let Ok(game) = &outcome {
      tracing::info!(
        game_id = game.id,
        player1_id,
        player2_id = ?game.player2_id,
        status = game.status.as_str(),
        "game created"
      );
    }
    Ok(outcome)
  }

  async fn get_game(
    &self,
    game_id: i64,
    user_id: i64,
  ) -> Result<Result<GameView, GameAccessRejection>> {
    let game = self
      .conn
      .call(move |conn| Ok(select_game(conn, game_id)?))
      .await?
      .map(RawGame::into_game)
      .transpose()?;

    Ok(match game {
      None => Err(GameAccessRejection::GameNotFound),
      Some(game) if !game.is_participant(user_id) => {
        Err(GameAccessRejection::AccessDenied)
      }
      Some(game) => Ok(GameView::from(game)),
    })
  }

  async fn join_game(
    &self,
    game_id: i64,
    user_id: i64,
  ) -> Result<Result<Game, JoinRejection>> {
    let now = Utc::now();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut game) = load_game(&tx, game_id)? else {
          return Ok(Err(JoinRejection::GameNotFound));
        };
        if game.player1_id == user_id {
          return Ok(Err(JoinRejection::OwnGame));
        }
        if game.status != GameStatus::Waiting || game.player2_id.is_some() {
          return Ok(Err(JoinRejection::NotWaiting));
        }
        if !user_exists(&tx, user_id)? {
          return Err(Error::in_call(Error::UserNotFound(user_id)));
        }

        game.player2_id = Some(user_id);
        game.status = GameStatus::InProgress;
        game.started_at = Some(now);
        write_game(&tx, &game)?;
        tx.commit()?;
        Ok(Ok(game))
      })
      .await?;

    if outcome.is_ok() {
      tracing::info!(game_id, user_id, "game joined");
    }
    Ok(outcome)
  }

  async fn make_move(
    &self,
    game_id: i64,
    cell_index: CellIndex,
    user_id: i64,
  ) -> Result<MoveOutcome> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(game) = load_game(&tx, game_id)? else {
          return Ok(Err(MoveFailure::GameNotFound));
        };
        let result = match play_move(&game, cell_index, user_id, Utc::now()) {
          Ok(result) => result,
          Err(rejection) => return Ok(Err(MoveFailure::Rejected(rejection))),
        };

        write_game(&tx, &result.game)?;
        tx.commit()?;
        Ok(Ok(result))
      })
      .await?;

    match &outcome {
      Ok(result) => tracing::debug!(
        game_id,
        user_id,
        %cell_index,
        status = result.game.status.as_str(),
        "move applied"
      ),
      Err(failure) => tracing::debug!(
        game_id,
        user_id,
        %cell_index,
        code = failure.code(),
        "move rejected"
      ),
    }
    Ok(outcome)
  }
}
