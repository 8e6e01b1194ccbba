//! Tic-tac-toe rules: a pure state machine with no I/O.
//!
//! Validation never fails with an error: a refused move is a
//! [`MoveRejection`] value the caller must translate. Applying a move copies
//! the board rather than mutating it. Locking and persistence belong to the
//! store backends, which run [`play_move`] inside a transaction.
//!
//! Status flow: `WAITING → IN_PROGRESS → {FINISHED, DRAW}`. `CANCELLED` and
//! `ABANDONED` are terminal too but are entered from outside the engine.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{
  Deserialize, Deserializer, Serialize,
  de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor},
};
use thiserror::Error;

use crate::Error;

/// Side length of the only supported board.
pub const BOARD_SIZE: u8 = 3;
pub const BOARD_CELLS: usize = 9;

/// The eight lines of a 3×3 board: rows, then columns, then diagonals.
///
/// The win check only understands this table; it does not generalise to
/// other board sizes even though `board_size` is stored per game.
pub const WINNING_LINES: [[usize; 3]; 8] = [
  [0, 1, 2],
  [3, 4, 5],
  [6, 7, 8],
  [0, 3, 6],
  [1, 4, 7],
  [2, 5, 8],
  [0, 4, 8],
  [2, 4, 6],
];

// ─── Symbols and board ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
  X,
  O,
}

impl Symbol {
  pub fn opponent(self) -> Self {
    match self {
      Self::X => Self::O,
      Self::O => Self::X,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::X => "X",
      Self::O => "O",
    }
  }
}

impl FromStr for Symbol {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "X" => Ok(Self::X),
      "O" => Ok(Self::O),
      other => Err(Error::UnknownSymbol(other.to_owned())),
    }
  }
}

pub type Cell = Option<Symbol>;

/// Row-major cells: index `row * 3 + col`.
pub type Board = [Cell; BOARD_CELLS];

pub fn empty_board() -> Board { [None; BOARD_CELLS] }

/// Build a board from a stored cell list, checking its length.
pub fn board_from_cells(cells: Vec<Cell>) -> crate::Result<Board> {
  let found = cells.len();
  cells.try_into().map_err(|_| Error::BoardLength {
    expected: BOARD_CELLS,
    found,
  })
}

// ─── Cell index ──────────────────────────────────────────────────────────────

/// A requested cell exactly as the client sent it.
///
/// Any JSON value deserialises: integers (including integral floats such as
/// `4.0`) keep their value, and everything else becomes
/// [`CellIndex::NOT_AN_INTEGER`]. The engine then rejects it as
/// [`MoveRejection::InvalidCell`] in its usual check order instead of the
/// frame failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellIndex(Option<i64>);

impl CellIndex {
  pub const NOT_AN_INTEGER: Self = Self(None);

  pub const fn new(index: i64) -> Self { Self(Some(index)) }

  pub fn get(self) -> Option<i64> { self.0 }

  /// The board position, if this is an integer inside the 3×3 board.
  pub fn on_board(self) -> Option<usize> {
    self
      .0
      .and_then(|i| usize::try_from(i).ok())
      .filter(|&cell| cell < BOARD_CELLS)
  }
}

impl Default for CellIndex {
  fn default() -> Self { Self::NOT_AN_INTEGER }
}

impl From<i64> for CellIndex {
  fn from(index: i64) -> Self { Self::new(index) }
}

impl fmt::Display for CellIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.0 {
      Some(i) => write!(f, "{i}"),
      None => f.write_str("<not an integer>"),
    }
  }
}

impl<'de> Deserialize<'de> for CellIndex {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    deserializer.deserialize_any(CellIndexVisitor)
  }
}

struct CellIndexVisitor;

impl<'de> Visitor<'de> for CellIndexVisitor {
  type Value = CellIndex;

  fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("a cell index")
  }

  fn visit_i64<E: de::Error>(self, v: i64) -> Result<CellIndex, E> {
    Ok(CellIndex::new(v))
  }

  fn visit_u64<E: de::Error>(self, v: u64) -> Result<CellIndex, E> {
    Ok(i64::try_from(v).map_or(CellIndex::NOT_AN_INTEGER, CellIndex::new))
  }

  fn visit_f64<E: de::Error>(self, v: f64) -> Result<CellIndex, E> {
    // Integral floats inside i64 range convert exactly.
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e18 {
      Ok(CellIndex::new(v as i64))
    } else {
      Ok(CellIndex::NOT_AN_INTEGER)
    }
  }

  fn visit_bool<E: de::Error>(self, _: bool) -> Result<CellIndex, E> {
    Ok(CellIndex::NOT_AN_INTEGER)
  }

  fn visit_str<E: de::Error>(self, _: &str) -> Result<CellIndex, E> {
    Ok(CellIndex::NOT_AN_INTEGER)
  }

  fn visit_unit<E: de::Error>(self) -> Result<CellIndex, E> {
    Ok(CellIndex::NOT_AN_INTEGER)
  }

  fn visit_none<E: de::Error>(self) -> Result<CellIndex, E> {
    Ok(CellIndex::NOT_AN_INTEGER)
  }

  fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<CellIndex, D::Error> {
    d.deserialize_any(self)
  }

  fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<CellIndex, A::Error> {
    while seq.next_element::<IgnoredAny>()?.is_some() {}
    Ok(CellIndex::NOT_AN_INTEGER)
  }

  fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<CellIndex, A::Error> {
    while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
    Ok(CellIndex::NOT_AN_INTEGER)
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
  Waiting,
  InProgress,
  Finished,
  Draw,
  Cancelled,
  Abandoned,
}

impl GameStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Waiting => "WAITING",
      Self::InProgress => "IN_PROGRESS",
      Self::Finished => "FINISHED",
      Self::Draw => "DRAW",
      Self::Cancelled => "CANCELLED",
      Self::Abandoned => "ABANDONED",
    }
  }
}

impl FromStr for GameStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "WAITING" => Ok(Self::Waiting),
      "IN_PROGRESS" => Ok(Self::InProgress),
      "FINISHED" => Ok(Self::Finished),
      "DRAW" => Ok(Self::Draw),
      "CANCELLED" => Ok(Self::Cancelled),
      "ABANDONED" => Ok(Self::Abandoned),
      other => Err(Error::UnknownGameStatus(other.to_owned())),
    }
  }
}

// ─── Game ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
  pub id:             i64,
  pub player1_id:     i64,
  /// `None` until an opponent joins.
  pub player2_id:     Option<i64>,
  pub board_state:    Board,
  pub board_size:     u8,
  pub current_turn:   Symbol,
  pub status:         GameStatus,
  pub winner_id:      Option<i64>,
  pub player1_symbol: Symbol,
  pub player2_symbol: Symbol,
  pub created_at:     DateTime<Utc>,
  pub started_at:     Option<DateTime<Utc>>,
  pub finished_at:    Option<DateTime<Utc>>,
}

impl Game {
  /// The symbol `user_id` plays, if they are in this game.
  pub fn symbol_for(&self, user_id: i64) -> Option<Symbol> {
    if user_id == self.player1_id {
      Some(self.player1_symbol)
    } else if Some(user_id) == self.player2_id {
      Some(self.player2_symbol)
    } else {
      None
    }
  }

  /// The player who writes `symbol`.
  pub fn player_for(&self, symbol: Symbol) -> Option<i64> {
    if symbol == self.player1_symbol {
      Some(self.player1_id)
    } else {
      self.player2_id
    }
  }

  pub fn is_participant(&self, user_id: i64) -> bool {
    self.symbol_for(user_id).is_some()
  }

  pub fn move_count(&self) -> usize {
    self.board_state.iter().filter(|c| c.is_some()).count()
  }
}

/// A game as returned to a participant, with its derived move count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
  #[serde(flatten)]
  pub game:       Game,
  pub move_count: usize,
}

impl From<Game> for GameView {
  fn from(game: Game) -> Self {
    let move_count = game.move_count();
    Self { game, move_count }
  }
}

// ─── Rejections ──────────────────────────────────────────────────────────────

/// Why the engine refused a move. Each non-playable status has its own
/// variant so callers can surface a precise message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveRejection {
  #[error("Waiting for opponent")]
  WaitingForOpponent,
  #[error("Game already finished")]
  GameFinished,
  #[error("Game already ended in a draw")]
  GameDrawn,
  #[error("Game has been cancelled")]
  GameCancelled,
  #[error("Game has been abandoned")]
  GameAbandoned,
  #[error("Only 3x3 boards are supported")]
  UnsupportedBoardSize,
  #[error("Invalid cell index")]
  InvalidCell,
  #[error("Cell already occupied")]
  CellOccupied,
  #[error("You are not in this game")]
  NotInGame,
  #[error("Not your turn")]
  NotYourTurn,
}

impl MoveRejection {
  /// Stable machine-readable code for the wire.
  pub fn code(self) -> &'static str {
    match self {
      Self::WaitingForOpponent => "WAITING_FOR_OPPONENT",
      Self::GameFinished => "GAME_FINISHED",
      Self::GameDrawn => "GAME_DRAWN",
      Self::GameCancelled => "GAME_CANCELLED",
      Self::GameAbandoned => "GAME_ABANDONED",
      Self::UnsupportedBoardSize => "UNSUPPORTED_BOARD_SIZE",
      Self::InvalidCell => "INVALID_CELL",
      Self::CellOccupied => "CELL_OCCUPIED",
      Self::NotInGame => "NOT_IN_GAME",
      Self::NotYourTurn => "NOT_YOUR_TURN",
    }
  }
}

/// Outcome of a move attempt against storage: the game may be missing, or
/// the engine may refuse the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveFailure {
  #[error("Game not found")]
  GameNotFound,
  #[error("{0}")]
  Rejected(#[from] MoveRejection),
}

impl MoveFailure {
  pub fn code(self) -> &'static str {
    match self {
      Self::GameNotFound => "GAME_NOT_FOUND",
      Self::Rejected(r) => r.code(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameCreateRejection {
  #[error("Cannot play against yourself")]
  SelfPlay,
  #[error("Player not found")]
  PlayerNotFound,
  #[error("Can only play with friends")]
  NotFriends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinRejection {
  #[error("Game not found")]
  GameNotFound,
  #[error("Game is not waiting for an opponent")]
  NotWaiting,
  #[error("Cannot join your own game")]
  OwnGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameAccessRejection {
  #[error("Game not found")]
  GameNotFound,
  #[error("Access denied")]
  AccessDenied,
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// Check a proposed move and resolve the mover's symbol.
///
/// Checks run in a fixed order: status, board size, cell range, occupancy,
/// participation, turn.
pub fn validate_move(
  game: &Game,
  cell_index: CellIndex,
  user_id: i64,
) -> Result<Symbol, MoveRejection> {
  match game.status {
    GameStatus::InProgress => {}
    GameStatus::Waiting => return Err(MoveRejection::WaitingForOpponent),
    GameStatus::Finished => return Err(MoveRejection::GameFinished),
    GameStatus::Draw => return Err(MoveRejection::GameDrawn),
    GameStatus::Cancelled => return Err(MoveRejection::GameCancelled),
    GameStatus::Abandoned => return Err(MoveRejection::GameAbandoned),
  }

  if game.board_size != BOARD_SIZE {
    return Err(MoveRejection::UnsupportedBoardSize);
  }

  let cell = cell_index.on_board().ok_or(MoveRejection::InvalidCell)?;

  if game.board_state[cell].is_some() {
    return Err(MoveRejection::CellOccupied);
  }

  let symbol = game
    .symbol_for(user_id)
    .ok_or(MoveRejection::NotInGame)?;

  if symbol != game.current_turn {
    return Err(MoveRejection::NotYourTurn);
  }

  Ok(symbol)
}

/// Return a copy of `board` with `symbol` written at `cell`.
pub fn apply_move(board: &Board, cell: usize, symbol: Symbol) -> Board {
  let mut next = *board;
  next[cell] = Some(symbol);
  next
}

/// Result of inspecting a board after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GameOutcome {
  Ongoing,
  Won { winner: Symbol, line: [usize; 3] },
  Draw,
}

impl GameOutcome {
  pub fn is_over(&self) -> bool { !matches!(self, Self::Ongoing) }

  pub fn is_draw(&self) -> bool { matches!(self, Self::Draw) }

  pub fn winner(&self) -> Option<Symbol> {
    match self {
      Self::Won { winner, .. } => Some(*winner),
      _ => None,
    }
  }

  pub fn line(&self) -> Option<[usize; 3]> {
    match self {
      Self::Won { line, .. } => Some(*line),
      _ => None,
    }
  }
}

/// Detect a win or a draw. The first completed line in [`WINNING_LINES`]
/// order wins; a full board with a completed line is a win, not a draw.
pub fn check_game_over(board: &Board) -> GameOutcome {
  for line in WINNING_LINES {
    let [a, b, c] = line;
    if let Some(symbol) = board[a]
      && board[b] == Some(symbol)
      && board[c] == Some(symbol)
    {
      return GameOutcome::Won { winner: symbol, line };
    }
  }

  if board.iter().all(Option::is_some) {
    GameOutcome::Draw
  } else {
    GameOutcome::Ongoing
  }
}

/// The game after an accepted move, plus what the move decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
  pub game:    Game,
  pub outcome: GameOutcome,
}

/// Validate, apply and score a move in one step.
///
/// On a terminal move the status, winner and `finished_at` are set and the
/// turn stays put; otherwise the turn flips exactly once.
pub fn play_move(
  game: &Game,
  cell_index: CellIndex,
  user_id: i64,
  now: DateTime<Utc>,
) -> Result<MoveResult, MoveRejection> {
  let symbol = validate_move(game, cell_index, user_id)?;
  let cell = cell_index.on_board().ok_or(MoveRejection::InvalidCell)?;

  let mut next = game.clone();
  next.board_state = apply_move(&game.board_state, cell, symbol);

  let outcome = check_game_over(&next.board_state);
  match outcome {
    GameOutcome::Won { winner, .. } => {
      next.status = GameStatus::Finished;
      next.winner_id = game.player_for(winner);
      next.finished_at = Some(now);
    }
    GameOutcome::Draw => {
      next.status = GameStatus::Draw;
      next.winner_id = None;
      next.finished_at = Some(now);
    }
    GameOutcome::Ongoing => {
      next.current_turn = game.current_turn.opponent();
    }
  }

  Ok(MoveResult { game: next, outcome })
}
