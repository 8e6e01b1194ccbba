//! JSON REST API for rally.
//!
//! Exposes an axum [`Router`] backed by any [`rally_core::store::RallyStore`].
//! Every handler reads the caller from an [`Identity`] request extension;
//! authenticating the request and inserting that extension is the embedding
//! server's job.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rally_api::api_router(store.clone()).layer(auth_layer))
//! ```
//!
//! [`Identity`]: rally_core::user::Identity

pub mod error;
pub mod friends;
pub mod games;
pub mod messages;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, patch, post},
};
use rally_core::store::RallyStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RallyStore + 'static,
{
  Router::new()
    // Messages
    .route("/messages/conversations", get(messages::conversations::<S>))
    .route("/messages/{id}", get(messages::history::<S>))
    .route("/messages/{id}/read", patch(messages::mark_read::<S>))
    // Friends
    .route("/friends", get(friends::list::<S>))
    .route("/friends/requests", get(friends::requests::<S>))
    .route("/friends/requests/{id}", post(friends::send_request::<S>))
    .route("/friends/requests/{id}/accept", post(friends::accept_request::<S>))
    .route("/friends/status/{id}", get(friends::status::<S>))
    .route("/friends/{id}", delete(friends::remove::<S>))
    // Games
    .route("/games", post(games::create::<S>))
    .route("/games/{id}", get(games::get_one::<S>))
    .route("/games/{id}/join", post(games::join::<S>))
    .route("/games/{id}/moves", post(games::make_move::<S>))
    .with_state(store)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    Extension,
    body::Body,
    http::{Request, StatusCode, header},
  };
  use rally_core::{
    store::{FriendshipStore, GameStore, MessageStore, UserStore},
    user::{Identity, NewUser, User},
  };
  use rally_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;

  async fn make_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.unwrap())
  }

  async fn user(store: &SqliteStore, name: &str) -> User {
    store
      .create_user(NewUser::new(format!("{name}@example.com"), name))
      .await
      .unwrap()
  }

  async fn befriend(store: &SqliteStore, a: &User, b: &User) {
    let req = store.send_friend_request(a.id, b.id).await.unwrap().unwrap();
    store
      .accept_friend_request(req.id, b.id)
      .await
      .unwrap()
      .unwrap();
  }

  async fn oneshot_as(
    store:  Arc<SqliteStore>,
    caller: &User,
    method: &str,
    uri:    &str,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    let req = builder.body(body).unwrap();
    let identity: Identity = caller.identity();

    let resp = api_router(store)
      .layer(Extension(identity))
      .oneshot(req)
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let json = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
  }

  // ── Messages ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn history_requires_friendship() {
    let store = make_store().await;
    let a = user(&store, "a").await;
    let b = user(&store, "b").await;

    let (status, body) =
      oneshot_as(store.clone(), &a, "GET", &format!("/messages/{}", b.id), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) =
      oneshot_as(store, &a, "GET", &format!("/messages/{}", a.id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn history_pages_and_marks_read() {
    let store = make_store().await;
    let a = user(&store, "a").await;
    let b = user(&store, "b").await;
    befriend(&store, &a, &b).await;
    for i in 0..3 {
      store.save_message(a.id, b.id, format!("m{i}")).await.unwrap();
    }

    let (status, body) = oneshot_as(
      store.clone(),
      &b,
      "GET",
      &format!("/messages/{}?limit=2", a.id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["hasMore"], true);
    assert_eq!(body["messages"][0]["content"], "m2");
    assert_eq!(body["messages"][0]["sender"]["username"], "a");
    let cursor = body["nextCursor"].as_i64().unwrap();

    let (_, body) = oneshot_as(
      store.clone(),
      &b,
      "GET",
      &format!("/messages/{}?limit=2&before={cursor}", a.id),
      None,
    )
    .await;
    assert_eq!(body["messages"][0]["content"], "m0");
    assert_eq!(body["hasMore"], false);
    assert_eq!(body["nextCursor"], Value::Null);

    // Every message was fetched by its receiver, so nothing is left unread.
    let (status, body) = oneshot_as(
      store,
      &b,
      "PATCH",
      &format!("/messages/{}/read", a.id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
  }

  #[tokio::test]
  async fn conversations_route_is_not_a_counterpart_id() {
    let store = make_store().await;
    let a = user(&store, "a").await;
    let b = user(&store, "b").await;
    store.save_message(b.id, a.id, "hey".into()).await.unwrap();

    let (status, body) =
      oneshot_as(store, &a, "GET", "/messages/conversations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["user"]["username"], "b");
    assert_eq!(body[0]["lastMessage"]["content"], "hey");
    assert_eq!(body[0]["unreadCount"], 1);
  }

  // ── Friends ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn friend_request_flow() {
    let store = make_store().await;
    let a = user(&store, "a").await;
    let b = user(&store, "b").await;

    let (status, request) = oneshot_as(
      store.clone(),
      &a,
      "POST",
      &format!("/friends/requests/{}", b.id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "PENDING");

    let (status, _) = oneshot_as(
      store.clone(),
      &b,
      "POST",
      &format!("/friends/requests/{}", a.id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, pending) =
      oneshot_as(store.clone(), &b, "GET", "/friends/requests", None).await;
    assert_eq!(pending[0]["requester"]["username"], "a");

    let id = request["id"].as_i64().unwrap();
    let (status, accepted) = oneshot_as(
      store.clone(),
      &b,
      "POST",
      &format!("/friends/requests/{id}/accept"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "ACCEPTED");

    let (_, status_body) = oneshot_as(
      store.clone(),
      &a,
      "GET",
      &format!("/friends/status/{}", b.id),
      None,
    )
    .await;
    assert_eq!(status_body["status"], "friends");

    let (_, friends) = oneshot_as(store.clone(), &a, "GET", "/friends", None).await;
    assert_eq!(friends[0]["username"], "b");

    let (status, _) = oneshot_as(
      store.clone(),
      &a,
      "DELETE",
      &format!("/friends/{}", b.id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!store.are_friends(a.id, b.id).await.unwrap());
  }

  // ── Games ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn game_moves_over_http() {
    let store = make_store().await;
    let a = user(&store, "a").await;
    let b = user(&store, "b").await;
    let c = user(&store, "c").await;

    let (status, _) = oneshot_as(
      store.clone(),
      &a,
      "POST",
      "/games",
      Some(serde_json::json!({ "opponentId": b.id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    befriend(&store, &a, &b).await;
    let (status, game) = oneshot_as(
      store.clone(),
      &a,
      "POST",
      "/games",
      Some(serde_json::json!({ "opponentId": b.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(game["status"], "IN_PROGRESS");
    let game_id = game["id"].as_i64().unwrap();
    let moves = format!("/games/{game_id}/moves");

    let (status, body) = oneshot_as(
      store.clone(),
      &b,
      "POST",
      &moves,
      Some(serde_json::json!({ "cellIndex": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NOT_YOUR_TURN");

    let (status, body) = oneshot_as(
      store.clone(),
      &a,
      "POST",
      &moves,
      Some(serde_json::json!({ "cellIndex": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["game"]["boardState"][4], "X");
    assert_eq!(body["game"]["currentTurn"], "O");
    assert!(body.get("line").is_none());

    let (status, body) = oneshot_as(
      store.clone(),
      &c,
      "POST",
      &moves,
      Some(serde_json::json!({ "cellIndex": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NOT_IN_GAME");

    let (status, view) = oneshot_as(
      store.clone(),
      &b,
      "GET",
      &format!("/games/{game_id}"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["moveCount"], 1);

    let (status, _) =
      oneshot_as(store, &c, "GET", &format!("/games/{game_id}"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn non_integer_and_negative_cells_are_invalid() {
    let store = make_store().await;
    let a = user(&store, "a").await;
    let b = user(&store, "b").await;
    befriend(&store, &a, &b).await;
    let game = store.create_game(a.id, Some(b.id)).await.unwrap().unwrap();
    let moves = format!("/games/{}/moves", game.id);

    let cells = [serde_json::json!(1.5), serde_json::json!(-1), serde_json::json!("4")];
    for cell in cells {
      let (status, body) = oneshot_as(
        store.clone(),
        &a,
        "POST",
        &moves,
        Some(serde_json::json!({ "cellIndex": cell })),
      )
      .await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{cell}");
      assert_eq!(body["code"], "INVALID_CELL", "{cell}");
    }

    let view = store.get_game(game.id, a.id).await.unwrap().unwrap();
    assert_eq!(view.move_count, 0);
  }

  #[tokio::test]
  async fn open_game_can_be_joined() {
    let store = make_store().await;
    let a = user(&store, "a").await;
    let b = user(&store, "b").await;

    let (_, game) = oneshot_as(
      store.clone(),
      &a,
      "POST",
      "/games",
      Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(game["status"], "WAITING");
    let game_id = game["id"].as_i64().unwrap();

    let (status, joined) = oneshot_as(
      store.clone(),
      &b,
      "POST",
      &format!("/games/{game_id}/join"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["status"], "IN_PROGRESS");
    assert_eq!(joined["player2Id"], b.id);

    let (status, _) = oneshot_as(
      store,
      &b,
      "POST",
      &format!("/games/{game_id}/join"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }
}
