//! [`FriendshipStore`] for [`SqliteStore`]: the relationship gate and the
//! request lifecycle.

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use rally_core::{
  friendship::{
    FriendRequest, Friendship, FriendshipRejection, FriendshipState,
    FriendshipStatus,
  },
  store::FriendshipStore,
  user::PublicProfile,
};

use crate::{
  Error, Result,
  encode::{
    FRIENDSHIP_COLUMNS, JOINED_USER_COLUMNS, RawFriendship, RawUser,
    USER_COLUMNS, decode_dt, encode_dt,
  },
  store::{SqliteStore, user_exists},
};

/// The row for the unordered pair `(a, b)`, if any.
fn select_pair(
  conn: &rusqlite::Connection,
  a: i64,
  b: i64,
) -> rusqlite::Result<Option<RawFriendship>> {
  conn
    .query_row(
      &format!(
        "SELECT {FRIENDSHIP_COLUMNS} FROM friendships
         WHERE (requester_id = ?1 AND addressee_id = ?2)
            OR (requester_id = ?2 AND addressee_id = ?1)"
      ),
      rusqlite::params![a, b],
      RawFriendship::from_row,
    )
    .optional()
}

fn select_by_id(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawFriendship>> {
  conn
    .query_row(
      &format!("SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE id = ?1"),
      rusqlite::params![id],
      RawFriendship::from_row,
    )
    .optional()
}

/// The relationship gate, usable inside other closures on the connection
/// thread.
pub(crate) fn accepted_between(
  conn: &rusqlite::Connection,
  a: i64,
  b: i64,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM friendships
         WHERE status = 'ACCEPTED'
           AND ((requester_id = ?1 AND addressee_id = ?2)
             OR (requester_id = ?2 AND addressee_id = ?1))",
        rusqlite::params![a, b],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

impl FriendshipStore for SqliteStore {
  async fn are_friends(&self, a: i64, b: i64) -> Result<bool> {
    if a == b {
      return Ok(false);
    }
    Ok(
      self
        .conn
        .call(move |conn| Ok(accepted_between(conn, a, b)?))
        .await?,
    )
  }

  async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>> {
    let ids = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT CASE WHEN requester_id = ?1 THEN addressee_id
                       ELSE requester_id END
           FROM friendships
           WHERE status = 'ACCEPTED'
             AND (requester_id = ?1 OR addressee_id = ?1)",
        )?;
        let ids = stmt
          .query_map(rusqlite::params![user_id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
      })
      .await?;
    Ok(ids)
  }

  async fn list_friends(&self, user_id: i64) -> Result<Vec<PublicProfile>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users
           WHERE id IN (
             SELECT CASE WHEN requester_id = ?1 THEN addressee_id
                         ELSE requester_id END
             FROM friendships
             WHERE status = 'ACCEPTED'
               AND (requester_id = ?1 OR addressee_id = ?1)
           )
           ORDER BY is_online DESC, username ASC"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![user_id], |row| RawUser::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(raws)
      })
      .await?;
    Ok(raws.into_iter().map(RawUser::into_profile).collect())
  }

  async fn pending_requests(&self, user_id: i64) -> Result<Vec<FriendRequest>> {
    let rows: Vec<(i64, String, RawUser)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT f.id, f.created_at, {JOINED_USER_COLUMNS}
           FROM friendships f
           JOIN users u ON u.id = f.requester_id
           WHERE f.addressee_id = ?1 AND f.status = 'PENDING'
           ORDER BY f.id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_id], |row| {
            Ok((row.get(0)?, row.get(1)?, RawUser::from_row(row, 2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, created_at, requester)| {
        Ok(FriendRequest {
          id,
          requester: requester.into_profile(),
          created_at: decode_dt(&created_at)?,
        })
      })
      .collect()
  }

  async fn friendship_status(
    &self,
    current: i64,
    target: i64,
  ) -> Result<FriendshipStatus> {
    if current == target {
      return Ok(FriendshipStatus::None);
    }
    let row = self
      .conn
      .call(move |conn| Ok(select_pair(conn, current, target)?))
      .await?;

    let Some(row) = row else {
      return Ok(FriendshipStatus::None);
    };
    let friendship = row.into_friendship()?;
    Ok(match friendship.status {
      FriendshipState::Accepted => FriendshipStatus::Friends,
      FriendshipState::Pending if friendship.requester_id == current => {
        FriendshipStatus::PendingSent
      }
      FriendshipState::Pending => FriendshipStatus::PendingReceived,
    })
  }

  async fn send_friend_request(
    &self,
    requester: i64,
    addressee: i64,
  ) -> Result<Result<Friendship, FriendshipRejection>> {
    if requester == addressee {
      return Ok(Err(FriendshipRejection::SelfRequest));
    }
    let now = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !user_exists(&tx, addressee)? {
          return Ok(Err(FriendshipRejection::UserNotFound));
        }
        if let Some(existing) = select_pair(&tx, requester, addressee)? {
          let state = existing
            .status
            .parse::<FriendshipState>()
            .map_err(Error::in_call)?;
          return Ok(Err(match state {
            FriendshipState::Accepted => FriendshipRejection::AlreadyFriends,
            FriendshipState::Pending => FriendshipRejection::RequestPending,
          }));
        }

        tx.execute(
          "INSERT INTO friendships (requester_id, addressee_id, status, created_at)
           VALUES (?1, ?2, 'PENDING', ?3)",
          rusqlite::params![requester, addressee, now],
        )?;
        let id = tx.last_insert_rowid();
        let row = select_by_id(&tx, id)?
          .ok_or_else(|| Error::in_call(Error::MissingRow(id)))?;
        tx.commit()?;
        Ok(Ok(row))
      })
      .await?;

    match outcome {
      Ok(row) => {
        tracing::debug!(requester, addressee, "friend request sent");
        Ok(Ok(row.into_friendship()?))
      }
      Err(rejection) => Ok(Err(rejection)),
    }
  }

  async fn accept_friend_request(
    &self,
    request_id: i64,
    current_user: i64,
  ) -> Result<Result<Friendship, FriendshipRejection>> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(row) = select_by_id(&tx, request_id)? else {
          return Ok(Err(FriendshipRejection::RequestNotFound));
        };
        if row.addressee_id != current_user {
          return Ok(Err(FriendshipRejection::NotAddressee));
        }
        if row.status != FriendshipState::Pending.as_str() {
          return Ok(Err(FriendshipRejection::NotPending));
        }

        tx.execute(
          "UPDATE friendships SET status = 'ACCEPTED' WHERE id = ?1",
          rusqlite::params![request_id],
        )?;
        let row = select_by_id(&tx, request_id)?
          .ok_or_else(|| Error::in_call(Error::MissingRow(request_id)))?;
        tx.commit()?;
        Ok(Ok(row))
      })
      .await?;

    match outcome {
      Ok(row) => {
        tracing::debug!(request_id, current_user, "friend request accepted");
        Ok(Ok(row.into_friendship()?))
      }
      Err(rejection) => Ok(Err(rejection)),
    }
  }

  async fn remove_friendship(
    &self,
    current_user: i64,
    other: i64,
  ) -> Result<Result<(), FriendshipRejection>> {
    if current_user == other {
      return Ok(Err(FriendshipRejection::SelfRequest));
    }
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM friendships
           WHERE (requester_id = ?1 AND addressee_id = ?2)
              OR (requester_id = ?2 AND addressee_id = ?1)",
          rusqlite::params![current_user, other],
        )?)
      })
      .await?;

    if deleted == 0 {
      return Ok(Err(FriendshipRejection::FriendshipNotFound));
    }
    tracing::debug!(current_user, other, "friendship removed");
    Ok(Ok(()))
  }
}
