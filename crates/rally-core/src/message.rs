//! Direct messages, history pages and conversation summaries.
//!
//! A message is immutable once written except for its `read` flag, which only
//! ever moves from `false` to `true`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::user::PublicProfile;

/// Upper bound on message length, in characters.
pub const MAX_CONTENT_CHARS: usize = 2000;

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 100;

// ─── Validation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContentError {
  #[error("message cannot be empty")]
  Empty,
  #[error("message exceeds {MAX_CONTENT_CHARS} characters ({0})")]
  TooLong(usize),
}

/// Check message content and return the trimmed text to persist.
///
/// The store does not re-validate; callers run this before saving.
pub fn validate_content(content: &str) -> Result<&str, ContentError> {
  let len = content.chars().count();
  if len > MAX_CONTENT_CHARS {
    return Err(ContentError::TooLong(len));
  }
  let trimmed = content.trim();
  if trimmed.is_empty() {
    return Err(ContentError::Empty);
  }
  Ok(trimmed)
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  /// Strictly increasing; the ordering key for history and delivery.
  pub id:          i64,
  pub sender_id:   i64,
  pub receiver_id: i64,
  pub content:     String,
  pub created_at:  DateTime<Utc>,
  pub read:        bool,
}

/// The sender fields joined onto delivered and historical messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderProfile {
  pub username:   String,
  pub avatar_url: Option<String>,
}

impl From<&PublicProfile> for SenderProfile {
  fn from(p: &PublicProfile) -> Self {
    Self {
      username:   p.username.clone(),
      avatar_url: p.avatar_url.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithSender {
  #[serde(flatten)]
  pub message: Message,
  pub sender:  SenderProfile,
}

// ─── History ─────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::MessageStore::history`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryQuery {
  pub limit:  Option<usize>,
  /// Only messages with an id strictly below this cursor are returned.
  pub before: Option<i64>,
}

impl HistoryQuery {
  pub fn new(limit: usize, before: Option<i64>) -> Self {
    Self { limit: Some(limit), before }
  }

  /// Requested page size clamped to `1..=MAX_PAGE_LIMIT`.
  pub fn effective_limit(&self) -> usize {
    self
      .limit
      .unwrap_or(DEFAULT_PAGE_LIMIT)
      .clamp(1, MAX_PAGE_LIMIT)
  }
}

/// One page of a conversation, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
  pub messages:    Vec<MessageWithSender>,
  pub has_more:    bool,
  /// Id of the last (oldest) returned message when more pages exist.
  pub next_cursor: Option<i64>,
}

// ─── Conversations ───────────────────────────────────────────────────────────

/// Derived per-counterpart aggregate; never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
  pub user:         PublicProfile,
  pub last_message: Message,
  /// Messages from `user` to the caller that the caller has not read.
  pub unread_count: u64,
}
