//! Encoding and decoding helpers between rally domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings. Enums are stored as their upper-case wire
//! names. The game board is a compact JSON array of nine cells.

use chrono::{DateTime, Utc};
use rally_core::{
  friendship::{Friendship, FriendshipState},
  game::{Board, Cell, Game, GameStatus, Symbol, board_from_cells},
  message::Message,
  user::{PublicProfile, User},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Board ───────────────────────────────────────────────────────────────────

pub fn encode_board(board: &Board) -> Result<String> {
  Ok(serde_json::to_string(board)?)
}

pub fn decode_board(s: &str) -> Result<Board> {
  let cells: Vec<Cell> = serde_json::from_str(s)?;
  Ok(board_from_cells(cells)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str =
  "id, email, username, display_name, avatar_url, is_online, created_at";

/// [`USER_COLUMNS`] qualified with the `u` alias, for joins.
pub const JOINED_USER_COLUMNS: &str = "u.id, u.email, u.username, \
  u.display_name, u.avatar_url, u.is_online, u.created_at";

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub id:           i64,
  pub email:        String,
  pub username:     String,
  pub display_name: Option<String>,
  pub avatar_url:   Option<String>,
  pub is_online:    bool,
  pub created_at:   String,
}

impl RawUser {
  /// Map a row selected with [`USER_COLUMNS`] starting at column `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(offset)?,
      email:        row.get(offset + 1)?,
      username:     row.get(offset + 2)?,
      display_name: row.get(offset + 3)?,
      avatar_url:   row.get(offset + 4)?,
      is_online:    row.get(offset + 5)?,
      created_at:   row.get(offset + 6)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:           self.id,
      email:        self.email,
      username:     self.username,
      display_name: self.display_name,
      avatar_url:   self.avatar_url,
      is_online:    self.is_online,
      created_at:   decode_dt(&self.created_at)?,
    })
  }

  pub fn into_profile(self) -> PublicProfile {
    PublicProfile {
      id:           self.id,
      username:     self.username,
      display_name: self.display_name,
      avatar_url:   self.avatar_url,
      is_online:    self.is_online,
    }
  }
}

pub const MESSAGE_COLUMNS: &str =
  "m.id, m.sender_id, m.receiver_id, m.content, m.created_at, m.is_read";

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub id:          i64,
  pub sender_id:   i64,
  pub receiver_id: i64,
  pub content:     String,
  pub created_at:  String,
  pub read:        bool,
}

impl RawMessage {
  /// Map a row selected with [`MESSAGE_COLUMNS`] as its first columns.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      sender_id:   row.get(1)?,
      receiver_id: row.get(2)?,
      content:     row.get(3)?,
      created_at:  row.get(4)?,
      read:        row.get(5)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:          self.id,
      sender_id:   self.sender_id,
      receiver_id: self.receiver_id,
      content:     self.content,
      created_at:  decode_dt(&self.created_at)?,
      read:        self.read,
    })
  }
}

pub const FRIENDSHIP_COLUMNS: &str =
  "id, requester_id, addressee_id, status, created_at";

/// Raw values read directly from a `friendships` row.
pub struct RawFriendship {
  pub id:           i64,
  pub requester_id: i64,
  pub addressee_id: i64,
  pub status:       String,
  pub created_at:   String,
}

impl RawFriendship {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      requester_id: row.get(1)?,
      addressee_id: row.get(2)?,
      status:       row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_friendship(self) -> Result<Friendship> {
    Ok(Friendship {
      id:           self.id,
      requester_id: self.requester_id,
      addressee_id: self.addressee_id,
      status:       self.status.parse::<FriendshipState>()?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const GAME_COLUMNS: &str = "id, player1_id, player2_id, board_state, \
  board_size, current_turn, status, winner_id, player1_symbol, \
  player2_symbol, created_at, started_at, finished_at";

/// Raw values read directly from a `games` row.
pub struct RawGame {
  pub id:             i64,
  pub player1_id:     i64,
  pub player2_id:     Option<i64>,
  pub board_state:    String,
  pub board_size:     u8,
  pub current_turn:   String,
  pub status:         String,
  pub winner_id:      Option<i64>,
  pub player1_symbol: String,
  pub player2_symbol: String,
  pub created_at:     String,
  pub started_at:     Option<String>,
  pub finished_at:    Option<String>,
}

impl RawGame {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      player1_id:     row.get(1)?,
      player2_id:     row.get(2)?,
      board_state:    row.get(3)?,
      board_size:     row.get(4)?,
      current_turn:   row.get(5)?,
      status:         row.get(6)?,
      winner_id:      row.get(7)?,
      player1_symbol: row.get(8)?,
      player2_symbol: row.get(9)?,
      created_at:     row.get(10)?,
      started_at:     row.get(11)?,
      finished_at:    row.get(12)?,
    })
  }

  pub fn into_game(self) -> Result<Game> {
    Ok(Game {
      id:             self.id,
      player1_id:     self.player1_id,
      player2_id:     self.player2_id,
      board_state:    decode_board(&self.board_state)?,
      board_size:     self.board_size,
      current_turn:   self.current_turn.parse::<Symbol>()?,
      status:         self.status.parse::<GameStatus>()?,
      winner_id:      self.winner_id,
      player1_symbol: self.player1_symbol.parse::<Symbol>()?,
      player2_symbol: self.player2_symbol.parse::<Symbol>()?,
      created_at:     decode_dt(&self.created_at)?,
      started_at:     decode_opt_dt(self.started_at)?,
      finished_at:    decode_opt_dt(self.finished_at)?,
    })
  }
}
