//! Integration tests for `SqliteStore` against an in-memory database.

use rally_core::{
  friendship::{FriendshipRejection, FriendshipState, FriendshipStatus},
  game::{
    CellIndex, GameAccessRejection, GameCreateRejection, GameStatus, JoinRejection,
    MoveFailure, MoveRejection, Symbol,
  },
  message::HistoryQuery,
  store::{FriendshipStore, GameStore, MessageStore, UserStore},
  user::{NewUser, User},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, name: &str) -> User {
  s.create_user(NewUser::new(format!("{name}@example.com"), name))
    .await
    .unwrap()
}

async fn befriend(s: &SqliteStore, a: &User, b: &User) {
  let request = s.send_friend_request(a.id, b.id).await.unwrap().unwrap();
  s.accept_friend_request(request.id, b.id)
    .await
    .unwrap()
    .unwrap();
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_user() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  assert!(!alice.is_online);

  let fetched = s.get_user(alice.id).await.unwrap().unwrap();
  assert_eq!(fetched.username, "alice");
  assert_eq!(fetched.email, "alice@example.com");

  assert!(s.get_user(alice.id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_is_an_error() {
  let s = store().await;
  user(&s, "alice").await;
  let dup = s
    .create_user(NewUser::new("other@example.com", "alice"))
    .await;
  assert!(dup.is_err());
}

#[tokio::test]
async fn set_online_updates_the_mirror() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  s.set_online(alice.id, true).await.unwrap();
  assert!(s.get_user(alice.id).await.unwrap().unwrap().is_online);

  s.set_online(alice.id, false).await.unwrap();
  assert!(!s.get_user(alice.id).await.unwrap().unwrap().is_online);

  assert!(s.set_online(9999, true).await.is_err());
}

// ─── Friendships ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn friendship_is_unordered() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;

  assert!(!s.are_friends(a.id, b.id).await.unwrap());

  let request = s.send_friend_request(a.id, b.id).await.unwrap().unwrap();
  assert_eq!(request.status, FriendshipState::Pending);
  // Pending is not enough for the gate.
  assert!(!s.are_friends(a.id, b.id).await.unwrap());

  s.accept_friend_request(request.id, b.id)
    .await
    .unwrap()
    .unwrap();
  assert!(s.are_friends(a.id, b.id).await.unwrap());
  assert!(s.are_friends(b.id, a.id).await.unwrap());
}

#[tokio::test]
async fn friend_request_rejections() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;

  assert_eq!(
    s.send_friend_request(a.id, a.id).await.unwrap().unwrap_err(),
    FriendshipRejection::SelfRequest
  );
  assert_eq!(
    s.send_friend_request(a.id, 9999).await.unwrap().unwrap_err(),
    FriendshipRejection::UserNotFound
  );

  let request = s.send_friend_request(a.id, b.id).await.unwrap().unwrap();
  // Either direction counts as the same pair.
  assert_eq!(
    s.send_friend_request(b.id, a.id).await.unwrap().unwrap_err(),
    FriendshipRejection::RequestPending
  );

  assert_eq!(
    s.accept_friend_request(request.id, a.id)
      .await
      .unwrap()
      .unwrap_err(),
    FriendshipRejection::NotAddressee
  );
  s.accept_friend_request(request.id, b.id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(
    s.accept_friend_request(request.id, b.id)
      .await
      .unwrap()
      .unwrap_err(),
    FriendshipRejection::NotPending
  );
  assert_eq!(
    s.accept_friend_request(request.id + 50, b.id)
      .await
      .unwrap()
      .unwrap_err(),
    FriendshipRejection::RequestNotFound
  );
  assert_eq!(
    s.send_friend_request(a.id, b.id).await.unwrap().unwrap_err(),
    FriendshipRejection::AlreadyFriends
  );
}

#[tokio::test]
async fn friendship_status_from_both_sides() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;

  assert_eq!(
    s.friendship_status(a.id, b.id).await.unwrap(),
    FriendshipStatus::None
  );
  let request = s.send_friend_request(a.id, b.id).await.unwrap().unwrap();
  assert_eq!(
    s.friendship_status(a.id, b.id).await.unwrap(),
    FriendshipStatus::PendingSent
  );
  assert_eq!(
    s.friendship_status(b.id, a.id).await.unwrap(),
    FriendshipStatus::PendingReceived
  );

  let pending = s.pending_requests(b.id).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].id, request.id);
  assert_eq!(pending[0].requester.username, "a");
  assert!(s.pending_requests(a.id).await.unwrap().is_empty());

  s.accept_friend_request(request.id, b.id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(
    s.friendship_status(b.id, a.id).await.unwrap(),
    FriendshipStatus::Friends
  );
  assert!(s.pending_requests(b.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unfriend_closes_the_gate() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  befriend(&s, &a, &b).await;

  s.remove_friendship(b.id, a.id).await.unwrap().unwrap();
  assert!(!s.are_friends(a.id, b.id).await.unwrap());
  assert_eq!(
    s.remove_friendship(a.id, b.id).await.unwrap().unwrap_err(),
    FriendshipRejection::FriendshipNotFound
  );

  // A fresh request is allowed once the pair is clear.
  assert!(s.send_friend_request(b.id, a.id).await.unwrap().is_ok());
}

#[tokio::test]
async fn friends_are_listed_online_first_then_by_name() {
  let s = store().await;
  let me = user(&s, "me").await;
  let zed = user(&s, "zed").await;
  let amy = user(&s, "amy").await;
  let bob = user(&s, "bob").await;
  let stranger = user(&s, "stranger").await;
  for friend in [&zed, &amy, &bob] {
    befriend(&s, &me, friend).await;
  }
  s.set_online(zed.id, true).await.unwrap();
  s.set_online(stranger.id, true).await.unwrap();

  let names: Vec<_> = s
    .list_friends(me.id)
    .await
    .unwrap()
    .into_iter()
    .map(|p| p.username)
    .collect();
  assert_eq!(names, vec!["zed", "amy", "bob"]);

  let mut ids = s.friend_ids(me.id).await.unwrap();
  ids.sort();
  assert_eq!(ids, vec![zed.id, amy.id, bob.id]);
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_pages_backwards_by_id() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;

  let mut ids = Vec::new();
  for i in 0..5 {
    let m = s.save_message(a.id, b.id, format!("m{i}")).await.unwrap();
    ids.push(m.id);
  }

  let first = s
    .history(b.id, a.id, HistoryQuery::new(2, None))
    .await
    .unwrap();
  let got: Vec<_> = first.messages.iter().map(|m| m.message.id).collect();
  assert_eq!(got, vec![ids[4], ids[3]]);
  assert!(first.has_more);
  assert_eq!(first.next_cursor, Some(ids[3]));
  assert_eq!(first.messages[0].sender.username, "a");

  let second = s
    .history(b.id, a.id, HistoryQuery::new(2, first.next_cursor))
    .await
    .unwrap();
  let got: Vec<_> = second.messages.iter().map(|m| m.message.id).collect();
  assert_eq!(got, vec![ids[2], ids[1]]);
  assert!(second.has_more);

  let third = s
    .history(b.id, a.id, HistoryQuery::new(2, second.next_cursor))
    .await
    .unwrap();
  let got: Vec<_> = third.messages.iter().map(|m| m.message.id).collect();
  assert_eq!(got, vec![ids[0]]);
  assert!(!third.has_more);
  assert_eq!(third.next_cursor, None);
}

#[tokio::test]
async fn cursor_pages_ignore_later_inserts() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  for i in 0..4 {
    s.save_message(a.id, b.id, format!("m{i}")).await.unwrap();
  }

  let first = s
    .history(a.id, b.id, HistoryQuery::new(2, None))
    .await
    .unwrap();
  let before = s
    .history(a.id, b.id, HistoryQuery::new(2, first.next_cursor))
    .await
    .unwrap();

  s.save_message(b.id, a.id, "late".into()).await.unwrap();
  s.save_message(a.id, b.id, "later".into()).await.unwrap();

  let after = s
    .history(a.id, b.id, HistoryQuery::new(2, first.next_cursor))
    .await
    .unwrap();
  let ids = |page: &rally_core::message::HistoryPage| {
    page.messages.iter().map(|m| m.message.id).collect::<Vec<_>>()
  };
  assert_eq!(ids(&before), ids(&after));
}

#[tokio::test]
async fn history_only_includes_the_pair() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  let c = user(&s, "c").await;
  s.save_message(a.id, b.id, "to b".into()).await.unwrap();
  s.save_message(c.id, a.id, "from c".into()).await.unwrap();
  s.save_message(b.id, a.id, "to a".into()).await.unwrap();

  let page = s.history(a.id, b.id, HistoryQuery::default()).await.unwrap();
  let contents: Vec<_> = page
    .messages
    .iter()
    .map(|m| m.message.content.as_str())
    .collect();
  assert_eq!(contents, vec!["to a", "to b"]);
}

#[tokio::test]
async fn history_marks_only_received_messages_read() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  let sent = s.save_message(a.id, b.id, "hello".into()).await.unwrap();
  let received = s.save_message(b.id, a.id, "hi back".into()).await.unwrap();
  assert!(!sent.read && !received.read);

  // `a` reads: only the message addressed to `a` flips.
  s.history(a.id, b.id, HistoryQuery::default()).await.unwrap();
  let page = s.history(b.id, a.id, HistoryQuery::default()).await.unwrap();
  let read_of = |id| {
    page
      .messages
      .iter()
      .find(|m| m.message.id == id)
      .map(|m| m.message.read)
  };
  assert_eq!(read_of(received.id), Some(true));
  // `b`'s fetch just flipped `sent`, which is reflected in the page.
  assert_eq!(read_of(sent.id), Some(true));

  // Nothing left to flip, and nothing ever flips back.
  assert_eq!(s.mark_read(a.id, b.id).await.unwrap(), 0);
  assert_eq!(s.mark_read(b.id, a.id).await.unwrap(), 0);
}

#[tokio::test]
async fn history_leaves_older_pages_unread() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  for i in 0..3 {
    s.save_message(a.id, b.id, format!("m{i}")).await.unwrap();
  }

  s.history(b.id, a.id, HistoryQuery::new(1, None)).await.unwrap();
  assert_eq!(s.mark_read(b.id, a.id).await.unwrap(), 2);
}

#[tokio::test]
async fn conversation_summaries_aggregate_per_counterpart() {
  let s = store().await;
  let me = user(&s, "me").await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;

  s.save_message(a.id, me.id, "a1".into()).await.unwrap();
  s.save_message(a.id, me.id, "a2".into()).await.unwrap();
  s.save_message(me.id, b.id, "b1".into()).await.unwrap();
  s.save_message(b.id, me.id, "b2".into()).await.unwrap();
  let last = s.save_message(me.id, a.id, "a3".into()).await.unwrap();

  let summaries = s.conversation_summaries(me.id).await.unwrap();
  assert_eq!(summaries.len(), 2);

  // Most recent conversation first.
  assert_eq!(summaries[0].user.id, a.id);
  assert_eq!(summaries[0].last_message.id, last.id);
  assert_eq!(summaries[0].unread_count, 2);

  assert_eq!(summaries[1].user.id, b.id);
  assert_eq!(summaries[1].last_message.content, "b2");
  assert_eq!(summaries[1].unread_count, 1);

  assert_eq!(s.mark_read(me.id, a.id).await.unwrap(), 2);
  let summaries = s.conversation_summaries(me.id).await.unwrap();
  assert_eq!(summaries[0].unread_count, 0);

  assert!(s.conversation_summaries(9999).await.unwrap().is_empty());
}

// ─── Games ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn direct_game_requires_friendship() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;

  assert_eq!(
    s.create_game(a.id, Some(a.id)).await.unwrap().unwrap_err(),
    GameCreateRejection::SelfPlay
  );
  assert_eq!(
    s.create_game(a.id, Some(9999)).await.unwrap().unwrap_err(),
    GameCreateRejection::PlayerNotFound
  );
  assert_eq!(
    s.create_game(a.id, Some(b.id)).await.unwrap().unwrap_err(),
    GameCreateRejection::NotFriends
  );

  befriend(&s, &a, &b).await;
  let game = s.create_game(a.id, Some(b.id)).await.unwrap().unwrap();
  assert_eq!(game.status, GameStatus::InProgress);
  assert_eq!(game.current_turn, Symbol::X);
  assert_eq!(game.player1_symbol, Symbol::X);
  assert_eq!(game.player2_symbol, Symbol::O);
  assert!(game.started_at.is_some());
  assert!(game.board_state.iter().all(Option::is_none));
}

#[tokio::test]
async fn open_game_waits_then_joins() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  let c = user(&s, "c").await;

  let game = s.create_game(a.id, None).await.unwrap().unwrap();
  assert_eq!(game.status, GameStatus::Waiting);
  assert_eq!(
    s.make_move(game.id, CellIndex::new(0), a.id).await.unwrap().unwrap_err(),
    MoveFailure::Rejected(MoveRejection::WaitingForOpponent)
  );
  assert_eq!(
    s.join_game(game.id, a.id).await.unwrap().unwrap_err(),
    JoinRejection::OwnGame
  );

  let joined = s.join_game(game.id, b.id).await.unwrap().unwrap();
  assert_eq!(joined.status, GameStatus::InProgress);
  assert_eq!(joined.player2_id, Some(b.id));
  assert!(joined.started_at.is_some());

  assert_eq!(
    s.join_game(game.id, c.id).await.unwrap().unwrap_err(),
    JoinRejection::NotWaiting
  );
  assert_eq!(
    s.join_game(game.id + 10, c.id).await.unwrap().unwrap_err(),
    JoinRejection::GameNotFound
  );
}

#[tokio::test]
async fn get_game_is_for_participants_only() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  let c = user(&s, "c").await;
  befriend(&s, &a, &b).await;
  let game = s.create_game(a.id, Some(b.id)).await.unwrap().unwrap();
  s.make_move(game.id, CellIndex::new(4), a.id).await.unwrap().unwrap();

  let view = s.get_game(game.id, b.id).await.unwrap().unwrap();
  assert_eq!(view.move_count, 1);
  assert_eq!(view.game.board_state[4], Some(Symbol::X));

  assert_eq!(
    s.get_game(game.id, c.id).await.unwrap().unwrap_err(),
    GameAccessRejection::AccessDenied
  );
  assert_eq!(
    s.get_game(game.id + 1, a.id).await.unwrap().unwrap_err(),
    GameAccessRejection::GameNotFound
  );
}

#[tokio::test]
async fn moves_persist_until_a_win() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  befriend(&s, &a, &b).await;
  let game = s.create_game(a.id, Some(b.id)).await.unwrap().unwrap();

  assert_eq!(
    s.make_move(game.id, CellIndex::new(0), b.id).await.unwrap().unwrap_err(),
    MoveFailure::Rejected(MoveRejection::NotYourTurn)
  );

  for (cell, player) in [(0, a.id), (3, b.id), (1, a.id), (4, b.id)] {
    let result = s.make_move(game.id, CellIndex::new(cell), player).await.unwrap().unwrap();
    assert!(!result.outcome.is_over());
  }
  let won = s.make_move(game.id, CellIndex::new(2), a.id).await.unwrap().unwrap();
  assert_eq!(won.outcome.line(), Some([0, 1, 2]));
  assert_eq!(won.game.status, GameStatus::Finished);
  assert_eq!(won.game.winner_id, Some(a.id));

  let stored = s.get_game(game.id, a.id).await.unwrap().unwrap();
  assert_eq!(stored.game, won.game);
  assert_eq!(stored.move_count, 5);

  assert_eq!(
    s.make_move(game.id, CellIndex::new(8), b.id).await.unwrap().unwrap_err(),
    MoveFailure::Rejected(MoveRejection::GameFinished)
  );
  assert_eq!(
    s.make_move(game.id + 1, CellIndex::new(8), b.id).await.unwrap().unwrap_err(),
    MoveFailure::GameNotFound
  );
}

#[tokio::test]
async fn concurrent_moves_on_one_cell_serialise() {
  let s = store().await;
  let a = user(&s, "a").await;
  let b = user(&s, "b").await;
  befriend(&s, &a, &b).await;
  let game = s.create_game(a.id, Some(b.id)).await.unwrap().unwrap();

  let (first, second) = tokio::join!(
    s.make_move(game.id, CellIndex::new(4), a.id),
    s.make_move(game.id, CellIndex::new(4), a.id),
  );
  let outcomes = [first.unwrap(), second.unwrap()];

  let accepted: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
  let rejected: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().err()).collect();
  assert_eq!(accepted.len(), 1);
  assert_eq!(
    rejected,
    vec![&MoveFailure::Rejected(MoveRejection::CellOccupied)]
  );
  assert_eq!(accepted[0].game.current_turn, Symbol::O);

  let stored = s.get_game(game.id, a.id).await.unwrap().unwrap();
  assert_eq!(stored.move_count, 1);
  assert_eq!(stored.game.current_turn, Symbol::O);
}
