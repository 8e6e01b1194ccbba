//! The presence registry: which users are connected, and the per-user
//! broadcast channel every one of their connections listens on.
//!
//! This is the only in-process state shared between connections. `join` and
//! `leave` take the same lock, so "first connection" and "last connection"
//! are each observed exactly once per online period.
//!
//! The work that follows a transition (the persisted mirror and the friend
//! fan-out) runs outside that lock. Each user has a [`PresenceGate`] that
//! serialises it and records what friends were last told, so a reconnect
//! racing the last disconnect can never leave friends believing the user is
//! offline.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::events::ServerEvent;

/// Identifies one realtime connection.
pub type ConnectionId = Uuid;

/// Events buffered per user before slow connections start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Per-user lock around presence side effects. The guarded value is the
/// online state last announced to friends.
pub type PresenceGate = Arc<tokio::sync::Mutex<bool>>;

struct UserChannel {
  connections: HashSet<ConnectionId>,
  tx:          broadcast::Sender<ServerEvent>,
}

#[derive(Default)]
struct Registry {
  users: HashMap<i64, UserChannel>,
  gates: HashMap<i64, PresenceGate>,
}

/// Result of [`PresenceRegistry::join`].
pub struct Joined {
  /// `true` when this connection took the user from offline to online.
  pub first:  bool,
  pub events: broadcast::Receiver<ServerEvent>,
}

pub struct PresenceRegistry {
  inner:    Mutex<Registry>,
  capacity: usize,
}

impl Default for PresenceRegistry {
  fn default() -> Self { Self::new(DEFAULT_CHANNEL_CAPACITY) }
}

impl PresenceRegistry {
  pub fn new(capacity: usize) -> Self {
    Self {
      inner:    Mutex::new(Registry::default()),
      capacity: capacity.max(1),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Registry> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register `connection_id` for `user_id` and subscribe it to the user's
  /// channel. Joining twice with the same id is harmless.
  pub fn join(&self, user_id: i64, connection_id: ConnectionId) -> Joined {
    let mut inner = self.lock();
    let first = !inner.users.contains_key(&user_id);
    let channel = inner.users.entry(user_id).or_insert_with(|| UserChannel {
      connections: HashSet::new(),
      tx:          broadcast::channel(self.capacity).0,
    });
    channel.connections.insert(connection_id);
    Joined {
      first,
      events: channel.tx.subscribe(),
    }
  }

  /// Remove `connection_id`. Returns `true` only when it was the user's last
  /// connection; unknown ids return `false`.
  pub fn leave(&self, user_id: i64, connection_id: ConnectionId) -> bool {
    let mut inner = self.lock();
    let Some(channel) = inner.users.get_mut(&user_id) else {
      return false;
    };
    if !channel.connections.remove(&connection_id) {
      return false;
    }
    if channel.connections.is_empty() {
      inner.users.remove(&user_id);
      return true;
    }
    false
  }

  pub fn is_online(&self, user_id: i64) -> bool { self.lock().users.contains_key(&user_id) }

  pub fn connection_count(&self, user_id: i64) -> usize {
    self
      .lock()
      .users
      .get(&user_id)
      .map_or(0, |channel| channel.connections.len())
  }

  /// Deliver `event` to every connection of `user_id`. Returns how many
  /// connections received it; offline users receive nothing.
  pub fn send_to_user(&self, user_id: i64, event: ServerEvent) -> usize {
    let inner = self.lock();
    match inner.users.get(&user_id) {
      Some(channel) => channel.tx.send(event).unwrap_or(0),
      None => 0,
    }
  }

  // ─── Side-effect gates ─────────────────────────────────────────────────────

  /// The user's presence gate, created on first use.
  pub fn gate(&self, user_id: i64) -> PresenceGate {
    self.lock().gates.entry(user_id).or_default().clone()
  }

  /// Hand back a gate obtained from [`Self::gate`]. The entry is dropped once
  /// the user is offline, friends were told so, and nobody else holds it.
  pub fn release_gate(&self, user_id: i64, gate: PresenceGate) {
    let mut inner = self.lock();
    if inner.users.contains_key(&user_id) {
      return;
    }
    // One reference in the map, one here.
    let unshared = Arc::strong_count(&gate) == 2;
    let announced_offline = gate.try_lock().is_ok_and(|announced| !*announced);
    if unshared && announced_offline {
      inner.gates.remove(&user_id);
    }
  }

  #[cfg(test)]
  fn gate_count(&self) -> usize { self.lock().gates.len() }
}
