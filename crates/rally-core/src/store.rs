//! Storage traits for users, friendships, messages and games.
//!
//! The traits are implemented by storage backends (e.g. `rally-store-sqlite`).
//! Higher layers (`rally-api`, `rally-gateway`) depend on these abstractions,
//! not on any concrete backend.
//!
//! Operations that can be refused for domain reasons return
//! `Result<Result<T, Rejection>, Self::Error>`: the outer error is a storage
//! failure, the inner one a rejection the caller must handle explicitly.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use crate::{
  friendship::{FriendRequest, Friendship, FriendshipRejection, FriendshipStatus},
  game::{
    CellIndex, Game, GameAccessRejection, GameCreateRejection, GameView, JoinRejection,
    MoveFailure,
  },
  message::{ConversationSummary, HistoryPage, HistoryQuery, Message},
  user::{NewUser, PublicProfile, User},
};

/// Shared error type for every store trait implemented by one backend.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Cheap liveness probe used by the health endpoint.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub trait UserStore: Backend {
  /// Create and persist a new user. Credentials are handled elsewhere.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Retrieve a user by id. Returns `None` if not found.
  fn get_user(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Update the persisted presence mirror.
  fn set_online(
    &self,
    id: i64,
    online: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Friendships ─────────────────────────────────────────────────────────────

/// Friendship persistence, including the relationship gate
/// ([`FriendshipStore::are_friends`]) consulted before every message send
/// and direct game creation.
///
/// Mutations on one unordered pair are serialised by the backend so that at
/// most one active row exists per pair.
pub trait FriendshipStore: Backend {
  /// `true` iff an ACCEPTED friendship exists between `a` and `b` in either
  /// direction. Callers treat `false` as "deny", not as an error.
  fn are_friends(
    &self,
    a: i64,
    b: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Ids of every accepted friend of `user_id`.
  fn friend_ids(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  /// Accepted friends' profiles, online first, then by username.
  fn list_friends(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<PublicProfile>, Self::Error>> + Send + '_;

  /// Incoming PENDING requests addressed to `user_id`.
  fn pending_requests(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<FriendRequest>, Self::Error>> + Send + '_;

  fn friendship_status(
    &self,
    current: i64,
    target: i64,
  ) -> impl Future<Output = Result<FriendshipStatus, Self::Error>> + Send + '_;

  fn send_friend_request(
    &self,
    requester: i64,
    addressee: i64,
  ) -> impl Future<
    Output = Result<Result<Friendship, FriendshipRejection>, Self::Error>,
  > + Send
  + '_;

  /// Move a PENDING request to ACCEPTED. Only the addressee may accept.
  fn accept_friend_request(
    &self,
    request_id: i64,
    current_user: i64,
  ) -> impl Future<
    Output = Result<Result<Friendship, FriendshipRejection>, Self::Error>,
  > + Send
  + '_;

  /// Delete the relationship with `other` whatever its state (unfriend,
  /// decline, or cancel).
  fn remove_friendship(
    &self,
    current_user: i64,
    other: i64,
  ) -> impl Future<Output = Result<Result<(), FriendshipRejection>, Self::Error>>
  + Send
  + '_;
}

// ─── Messages ────────────────────────────────────────────────────────────────

pub trait MessageStore: Backend {
  /// Persist a message. `content` must already be validated and trimmed.
  fn save_message(
    &self,
    sender_id: i64,
    receiver_id: i64,
    content: String,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// One page of the conversation between `user_id` and `counterpart_id`,
  /// newest first, keyed on message id.
  ///
  /// Every returned message addressed to `user_id` is marked read as part of
  /// the same call.
  fn history(
    &self,
    user_id: i64,
    counterpart_id: i64,
    query: HistoryQuery,
  ) -> impl Future<Output = Result<HistoryPage, Self::Error>> + Send + '_;

  /// Mark every unread message from `counterpart_id` to `user_id` read.
  /// Returns how many rows flipped.
  fn mark_read(
    &self,
    user_id: i64,
    counterpart_id: i64,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Latest message and unread count for every counterpart of `user_id`,
  /// most recent conversation first.
  fn conversation_summaries(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>>
  + Send
  + '_;
}

// ─── Games ───────────────────────────────────────────────────────────────────

pub trait GameStore: Backend {
  /// Create a game. With an opponent it starts IN_PROGRESS (the pair must be
  /// friends); without one it waits for a second player.
  fn create_game(
    &self,
    player1_id: i64,
    player2_id: Option<i64>,
  ) -> impl Future<
    Output = Result<Result<Game, GameCreateRejection>, Self::Error>,
  > + Send
  + '_;

  /// Fetch a game for one of its participants.
  fn get_game(
    &self,
    game_id: i64,
    user_id: i64,
  ) -> impl Future<
    Output = Result<Result<GameView, GameAccessRejection>, Self::Error>,
  > + Send
  + '_;

  /// Take the open seat of a WAITING game.
  fn join_game(
    &self,
    game_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<Result<Game, JoinRejection>, Self::Error>>
  + Send
  + '_;

  /// Validate and apply a move atomically. Concurrent moves on the same game
  /// are serialised: the later one sees the earlier one's board.
  fn make_move(
    &self,
    game_id: i64,
    cell_index: CellIndex,
    user_id: i64,
  ) -> impl Future<Output = Result<MoveOutcome, Self::Error>> + Send + '_;
}

/// What [`GameStore::make_move`] decided.
pub type MoveOutcome = Result<crate::game::MoveResult, MoveFailure>;

/// Everything the service layers need from one backend.
pub trait RallyStore:
  UserStore + FriendshipStore + MessageStore + GameStore
{
}

impl<T> RallyStore for T where
  T: UserStore + FriendshipStore + MessageStore + GameStore
{
}
