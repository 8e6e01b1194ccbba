//! The realtime event router: connection lifecycle and inbound event dispatch.
//!
//! Each connection drives the router sequentially: one [`RealtimeRouter::connect`],
//! then one [`RealtimeRouter::handle_event`] per inbound frame, then one
//! [`RealtimeRouter::disconnect`]. Events addressed to users go through the
//! [`PresenceRegistry`]; a reply meant for the acting connection alone is
//! returned to the caller instead.

use std::sync::Arc;

use rally_core::{
  game::CellIndex,
  message::{MessageWithSender, SenderProfile, validate_content},
  store::RallyStore,
  user::Identity,
};
use tokio::sync::broadcast;

use crate::{
  Error, Result,
  events::{ClientEvent, ServerEvent},
  presence::{ConnectionId, PresenceRegistry},
};

pub struct RealtimeRouter<S> {
  store:    Arc<S>,
  presence: Arc<PresenceRegistry>,
}

impl<S> Clone for RealtimeRouter<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      presence: self.presence.clone(),
    }
  }
}

impl<S> RealtimeRouter<S>
where
  S: RallyStore + 'static,
{
  pub fn new(store: Arc<S>, presence: Arc<PresenceRegistry>) -> Self {
    Self { store, presence }
  }

  pub fn presence(&self) -> &PresenceRegistry { &self.presence }

  // ─── Lifecycle ─────────────────────────────────────────────────────────────

  /// Join the presence registry and return the user's event stream. On the
  /// user's first connection the presence mirror is set and friends are told.
  pub async fn connect(
    &self,
    identity: &Identity,
    connection_id: ConnectionId,
  ) -> broadcast::Receiver<ServerEvent> {
    let joined = self.presence.join(identity.id, connection_id);
    tracing::info!(
      user_id = identity.id,
      %connection_id,
      first = joined.first,
      "realtime connection opened"
    );

    if joined.first {
      self.settle_presence(identity.id).await;
    }
    joined.events
  }

  /// Leave the presence registry. Only the user's last connection flips the
  /// presence mirror and notifies friends.
  pub async fn disconnect(&self, identity: &Identity, connection_id: ConnectionId) {
    let was_last = self.presence.leave(identity.id, connection_id);
    tracing::info!(
      user_id = identity.id,
      %connection_id,
      was_last,
      "realtime connection closed"
    );

    if was_last {
      self.settle_presence(identity.id).await;
    }
  }

  /// Bring the mirror and the friends' view in line with the registry.
  ///
  /// Runs under the user's presence gate and re-reads the registry once
  /// inside it, so racing transitions collapse into the final state.
  async fn settle_presence(&self, user_id: i64) {
    let gate = self.presence.gate(user_id);
    {
      let mut announced = gate.lock().await;
      let online = self.presence.is_online(user_id);
      if online != *announced {
        self.persist_presence(user_id, online).await;
        let event = if online {
          ServerEvent::UserOnline { user_id }
        } else {
          ServerEvent::UserOffline { user_id }
        };
        self.notify_friends(user_id, event).await;
        *announced = online;
      } else {
        tracing::debug!(user_id, online, "presence unchanged, nothing to announce");
      }
    }
    self.presence.release_gate(user_id, gate);
  }

  async fn persist_presence(&self, user_id: i64, online: bool) {
    if let Err(e) = self.store.set_online(user_id, online).await {
      tracing::warn!(user_id, online, error = %e, "failed to persist presence");
    }
  }

  async fn notify_friends(&self, user_id: i64, event: ServerEvent) {
    let friends = match self.store.friend_ids(user_id).await {
      Ok(friends) => friends,
      Err(e) => {
        tracing::warn!(user_id, error = %e, "failed to load friends for presence fan-out");
        return;
      }
    };
    for friend_id in friends {
      self.presence.send_to_user(friend_id, event.clone());
    }
  }

  // ─── Dispatch ──────────────────────────────────────────────────────────────

  /// Parse and dispatch one text frame. Unparseable frames produce a
  /// `message_error` reply; the connection stays open.
  pub async fn handle_text(&self, identity: &Identity, text: &str) -> Option<ServerEvent> {
    match serde_json::from_str::<ClientEvent>(text) {
      Ok(event) => self.handle_event(identity, event).await,
      Err(e) => {
        tracing::debug!(user_id = identity.id, error = %e, "unparseable frame");
        Some(ServerEvent::message_error("Invalid event payload"))
      }
    }
  }

  /// Dispatch one inbound event. The returned event, if any, is meant for
  /// the acting connection only.
  pub async fn handle_event(
    &self,
    identity: &Identity,
    event: ClientEvent,
  ) -> Option<ServerEvent> {
    let name = event.name();
    let outcome = match event {
      ClientEvent::SendMessage {
        receiver_id,
        content,
      } => self.send_message(identity, receiver_id, &content).await,
      ClientEvent::Typing {
        receiver_id,
        is_typing,
      } => Ok(self.typing(identity, receiver_id, is_typing)),
      ClientEvent::MakeMove {
        game_id,
        cell_index,
      } => self.make_move(identity, game_id, cell_index).await,
      ClientEvent::MarkRead { counterpart_id } => {
        self.mark_read(identity, counterpart_id).await
      }
    };

    match outcome {
      Ok(reply) => reply,
      Err(e) => {
        tracing::error!(user_id = identity.id, event = name, error = %e, "event failed");
        Some(ServerEvent::message_error("Internal server error"))
      }
    }
  }

  async fn send_message(
    &self,
    sender: &Identity,
    receiver_id: i64,
    content: &str,
  ) -> Result<Option<ServerEvent>> {
    let content = match validate_content(content) {
      Ok(content) => content.to_owned(),
      Err(e) => return Ok(Some(ServerEvent::message_error(e.to_string()))),
    };

    if self
      .store
      .get_user(receiver_id)
      .await
      .map_err(Error::store)?
      .is_none()
    {
      return Ok(Some(ServerEvent::message_error("Receiver does not exist")));
    }

    // Checked on every send so an unfriend takes effect mid-session.
    let friends = self
      .store
      .are_friends(sender.id, receiver_id)
      .await
      .map_err(Error::store)?;
    if !friends {
      return Ok(Some(ServerEvent::message_error(
        "You can only send messages to friends",
      )));
    }

    let Some(profile) = self.store.get_user(sender.id).await.map_err(Error::store)?
    else {
      return Ok(Some(ServerEvent::message_error("Sender does not exist")));
    };
    let message = self
      .store
      .save_message(sender.id, receiver_id, content)
      .await
      .map_err(Error::store)?;

    let delivered = ServerEvent::ReceiveMessage(MessageWithSender {
      message,
      sender: SenderProfile::from(&profile.profile()),
    });
    self.presence.send_to_user(receiver_id, delivered.clone());
    self.presence.send_to_user(sender.id, delivered);
    Ok(None)
  }

  fn typing(
    &self,
    sender: &Identity,
    receiver_id: i64,
    is_typing: bool,
  ) -> Option<ServerEvent> {
    if receiver_id != sender.id {
      self.presence.send_to_user(receiver_id, ServerEvent::UserTyping {
        user_id: sender.id,
        username: sender.username.clone(),
        is_typing,
      });
    }
    None
  }

  async fn make_move(
    &self,
    player: &Identity,
    game_id: i64,
    cell_index: CellIndex,
  ) -> Result<Option<ServerEvent>> {
    let outcome = self
      .store
      .make_move(game_id, cell_index, player.id)
      .await
      .map_err(Error::store)?;

    let result = match outcome {
      Ok(result) => result,
      Err(failure) => return Ok(Some(ServerEvent::move_error(game_id, failure))),
    };

    let line = result.outcome.line();
    let game = result.game;
    let players = [Some(game.player1_id), game.player2_id];
    let event = ServerEvent::GameUpdated { game, line };
    for player_id in players.into_iter().flatten() {
      self.presence.send_to_user(player_id, event.clone());
    }
    Ok(None)
  }

  async fn mark_read(
    &self,
    reader: &Identity,
    counterpart_id: i64,
  ) -> Result<Option<ServerEvent>> {
    let count = self
      .store
      .mark_read(reader.id, counterpart_id)
      .await
      .map_err(Error::store)?;
    if count > 0 {
      self.presence.send_to_user(counterpart_id, ServerEvent::MessagesRead {
        reader_id: reader.id,
        count,
      });
    }
    Ok(None)
  }
}
