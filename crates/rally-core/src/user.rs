//! Users and the identity carried by a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The identity decoded from a session token.
///
/// Attached to an HTTP request for its duration, or to a realtime connection
/// for its whole lifetime. Never mutated after the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub id:       i64,
  pub email:    String,
  pub username: String,
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id:           i64,
  pub email:        String,
  pub username:     String,
  pub display_name: Option<String>,
  pub avatar_url:   Option<String>,
  /// Persisted mirror of the in-memory presence registry. May briefly lag.
  pub is_online:    bool,
  pub created_at:   DateTime<Utc>,
}

impl User {
  pub fn profile(&self) -> PublicProfile {
    PublicProfile {
      id:           self.id,
      username:     self.username.clone(),
      display_name: self.display_name.clone(),
      avatar_url:   self.avatar_url.clone(),
      is_online:    self.is_online,
    }
  }

  pub fn identity(&self) -> Identity {
    Identity {
      id:       self.id,
      email:    self.email.clone(),
      username: self.username.clone(),
    }
  }
}

/// The fields of a user that other users may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
  pub id:           i64,
  pub username:     String,
  pub display_name: Option<String>,
  pub avatar_url:   Option<String>,
  pub is_online:    bool,
}

/// Input to [`crate::store::UserStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:        String,
  pub username:     String,
  pub display_name: Option<String>,
  pub avatar_url:   Option<String>,
}

impl NewUser {
  pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
    Self {
      email:        email.into(),
      username:     username.into(),
      display_name: None,
      avatar_url:   None,
    }
  }
}
