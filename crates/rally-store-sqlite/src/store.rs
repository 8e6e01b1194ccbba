//! [`SqliteStore`]: connection management plus the [`UserStore`] impl.
//!
//! The remaining store traits are implemented in sibling modules.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use rally_core::{
  store::{Backend, UserStore},
  user::{NewUser, User},
};

use crate::{
  Error, Result,
  encode::{RawUser, USER_COLUMNS, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A rally store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Shared row lookups ──────────────────────────────────────────────────────

/// Load one user row on the connection thread.
pub(crate) fn select_user(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
      rusqlite::params![id],
      |row| RawUser::from_row(row, 0),
    )
    .optional()
}

pub(crate) fn user_exists(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM users WHERE id = ?1", rusqlite::params![id], |_| {
        Ok(())
      })
      .optional()?
      .is_some(),
  )
}

// ─── Trait impls ─────────────────────────────────────────────────────────────

impl Backend for SqliteStore {
  type Error = Error;

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl UserStore for SqliteStore {
  async fn create_user(&self, input: NewUser) -> Result<User> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (email, username, display_name, avatar_url, \
           is_online, created_at) VALUES (?1, ?2, ?3, ?4, 0, ?5)",
          rusqlite::params![
            input.email,
            input.username,
            input.display_name,
            input.avatar_url,
            now,
          ],
        )?;
        let id = conn.last_insert_rowid();
        select_user(conn, id)?
          .ok_or_else(|| Error::in_call(Error::MissingRow(id)))
      })
      .await?;

    tracing::debug!(user_id = raw.id, username = %raw.username, "user created");
    raw.into_user()
  }

  async fn get_user(&self, id: i64) -> Result<Option<User>> {
    let raw = self.conn.call(move |conn| Ok(select_user(conn, id)?)).await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn set_online(&self, id: i64, online: bool) -> Result<()> {
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET is_online = ?2 WHERE id = ?1",
          rusqlite::params![id, online],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::UserNotFound(id));
    }
    Ok(())
  }
}
