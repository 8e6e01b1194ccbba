//! [`MessageStore`] for [`SqliteStore`]: persistence, cursor pagination,
//! read marking and conversation summaries.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::TransactionBehavior;

use rally_core::{
  message::{
    ConversationSummary, HistoryPage, HistoryQuery, Message, MessageWithSender,
    SenderProfile,
  },
  store::MessageStore,
};

use crate::{
  Result,
  encode::{JOINED_USER_COLUMNS, MESSAGE_COLUMNS, RawMessage, RawUser, encode_dt},
  store::SqliteStore,
};

/// Number of columns in [`MESSAGE_COLUMNS`]; joined user columns follow.
const MESSAGE_WIDTH: usize = 6;

impl MessageStore for SqliteStore {
  async fn save_message(
    &self,
    sender_id: i64,
    receiver_id: i64,
    content: String,
  ) -> Result<Message> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (sender_id, receiver_id, content, created_at, is_read)
           VALUES (?1, ?2, ?3, ?4, 0)",
          rusqlite::params![sender_id, receiver_id, content, now],
        )?;
        let id = conn.last_insert_rowid();
        let raw = conn.query_row(
          &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1"),
          rusqlite::params![id],
          RawMessage::from_row,
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_message()
  }

  async fn history(
    &self,
    user_id: i64,
    counterpart_id: i64,
    query: HistoryQuery,
  ) -> Result<HistoryPage> {
    let limit = query.effective_limit();
    let before = query.before;

    let (rows, has_more) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}, {JOINED_USER_COLUMNS}
             FROM messages m
             JOIN users u ON u.id = m.sender_id
             WHERE ((m.sender_id = ?1 AND m.receiver_id = ?2)
                 OR (m.sender_id = ?2 AND m.receiver_id = ?1))
               AND (?3 IS NULL OR m.id < ?3)
             ORDER BY m.id DESC
             LIMIT ?4"
          ))?;
          stmt
            .query_map(
              rusqlite::params![user_id, counterpart_id, before, limit as i64 + 1],
              |row| {
                Ok((RawMessage::from_row(row)?, RawUser::from_row(row, MESSAGE_WIDTH)?))
              },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let has_more = rows.len() > limit;
        rows.truncate(limit);

        // Flip every fetched unread message addressed to the caller.
        {
          let mut mark = tx.prepare_cached(
            "UPDATE messages SET is_read = 1 WHERE id = ?1 AND is_read = 0",
          )?;
          for (message, _) in rows.iter_mut() {
            if message.receiver_id == user_id && !message.read {
              mark.execute(rusqlite::params![message.id])?;
              message.read = true;
            }
          }
        }

        tx.commit()?;
        Ok((rows, has_more))
      })
      .await?;

    let messages = rows
      .into_iter()
      .map(|(message, sender)| {
        let sender = sender.into_profile();
        Ok(MessageWithSender {
          message: message.into_message()?,
          sender:  SenderProfile::from(&sender),
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let next_cursor = if has_more {
      messages.last().map(|m| m.message.id)
    } else {
      None
    };

    Ok(HistoryPage {
      messages,
      has_more,
      next_cursor,
    })
  }

  async fn mark_read(&self, user_id: i64, counterpart_id: i64) -> Result<u64> {
    let flipped = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE messages SET is_read = 1
           WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
          rusqlite::params![counterpart_id, user_id],
        )?)
      })
      .await?;

    if flipped > 0 {
      tracing::debug!(user_id, counterpart_id, flipped, "messages marked read");
    }
    Ok(flipped as u64)
  }

  async fn conversation_summaries(
    &self,
    user_id: i64,
  ) -> Result<Vec<ConversationSummary>> {
    let (latest, unread) = self
      .conn
      .call(move |conn| {
        let latest = {
          let mut stmt = conn.prepare(&format!(
            "WITH conv AS (
               SELECT CASE WHEN sender_id = ?1 THEN receiver_id
                           ELSE sender_id END AS other,
                      MAX(id) AS last_id
               FROM messages
               WHERE sender_id = ?1 OR receiver_id = ?1
               GROUP BY other
             )
             SELECT {MESSAGE_COLUMNS}, {JOINED_USER_COLUMNS}
             FROM conv
             JOIN messages m ON m.id = conv.last_id
             JOIN users u ON u.id = conv.other
             ORDER BY m.id DESC"
          ))?;
          stmt
            .query_map(rusqlite::params![user_id], |row| {
              Ok((RawMessage::from_row(row)?, RawUser::from_row(row, MESSAGE_WIDTH)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let unread = {
          let mut stmt = conn.prepare(
            "SELECT sender_id, COUNT(*) FROM messages
             WHERE receiver_id = ?1 AND is_read = 0
             GROUP BY sender_id",
          )?;
          stmt
            .query_map(rusqlite::params![user_id], |row| {
              Ok((row.get::<_, i64>(0)?, row.get::<_, u64>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<i64, u64>>>()?
        };

        Ok((latest, unread))
      })
      .await?;

    latest
      .into_iter()
      .map(|(message, counterpart)| {
        let user = counterpart.into_profile();
        Ok(ConversationSummary {
          unread_count: unread.get(&user.id).copied().unwrap_or(0),
          user,
          last_message: message.into_message()?,
        })
      })
      .collect()
  }
}
