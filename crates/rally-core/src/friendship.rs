//! Friendships, the relationship every message and direct game requires.
//!
//! A friendship row is unordered for lookup purposes: A→B and B→A describe the
//! same relationship. At most one PENDING or ACCEPTED row exists per pair. A
//! row is created PENDING by the requester and either moves once to ACCEPTED
//! or is deleted (decline, cancel, unfriend).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Error, user::PublicProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendshipState {
  Pending,
  Accepted,
}

impl FriendshipState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "PENDING",
      Self::Accepted => "ACCEPTED",
    }
  }
}

impl FromStr for FriendshipState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "PENDING" => Ok(Self::Pending),
      "ACCEPTED" => Ok(Self::Accepted),
      other => Err(Error::UnknownFriendshipState(other.to_owned())),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
  pub id:           i64,
  pub requester_id: i64,
  pub addressee_id: i64,
  pub status:       FriendshipState,
  pub created_at:   DateTime<Utc>,
}

impl Friendship {
  /// The member of the pair that is not `user_id`.
  pub fn other(&self, user_id: i64) -> i64 {
    if self.requester_id == user_id {
      self.addressee_id
    } else {
      self.requester_id
    }
  }
}

/// The relationship between the caller and another user, as the caller sees
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
  None,
  PendingSent,
  PendingReceived,
  Friends,
}

/// An incoming friend request with the requester's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
  pub id:         i64,
  pub requester:  PublicProfile,
  pub created_at: DateTime<Utc>,
}

/// Why a friendship mutation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FriendshipRejection {
  #[error("you cannot befriend yourself")]
  SelfRequest,
  #[error("user not found")]
  UserNotFound,
  #[error("you are already friends with this user")]
  AlreadyFriends,
  #[error("a friend request already exists between you and this user")]
  RequestPending,
  #[error("friend request not found")]
  RequestNotFound,
  #[error("you can only accept requests sent to you")]
  NotAddressee,
  #[error("friend request is already accepted")]
  NotPending,
  #[error("friendship or friend request not found")]
  FriendshipNotFound,
}
