//! Realtime protocol frames.
//!
//! Every frame in either direction is a JSON object
//! `{"event": "<snake_case name>", "data": {...}}` with camelCase data fields.

use rally_core::{
  game::{CellIndex, Game, MoveFailure},
  message::MessageWithSender,
};
use serde::{Deserialize, Serialize};

// ─── Client → server ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ClientEvent {
  SendMessage { receiver_id: i64, content: String },
  Typing { receiver_id: i64, is_typing: bool },
  MakeMove {
    game_id:    i64,
    #[serde(default)]
    cell_index: CellIndex,
  },
  MarkRead { counterpart_id: i64 },
}

impl ClientEvent {
  pub fn name(&self) -> &'static str {
    match self {
      Self::SendMessage { .. } => "send_message",
      Self::Typing { .. } => "typing",
      Self::MakeMove { .. } => "make_move",
      Self::MarkRead { .. } => "mark_read",
    }
  }
}

// ─── Server → client ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ServerEvent {
  /// A persisted message, delivered to the receiver and echoed to the sender.
  ReceiveMessage(MessageWithSender),
  /// A send or protocol failure, for the acting connection only.
  MessageError { message: String },
  UserTyping {
    user_id:   i64,
    username:  String,
    is_typing: bool,
  },
  UserOnline { user_id: i64 },
  UserOffline { user_id: i64 },
  GameUpdated {
    game: Game,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<[usize; 3]>,
  },
  MoveError {
    game_id: i64,
    code:    String,
    message: String,
  },
  MessagesRead { reader_id: i64, count: u64 },
}

impl ServerEvent {
  pub fn message_error(message: impl Into<String>) -> Self {
    Self::MessageError {
      message: message.into(),
    }
  }

  pub fn move_error(game_id: i64, failure: MoveFailure) -> Self {
    Self::MoveError {
      game_id,
      code: failure.code().to_owned(),
      message: failure.to_string(),
    }
  }

  pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string(self) }
}
