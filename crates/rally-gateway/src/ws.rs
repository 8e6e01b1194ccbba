//! WebSocket transport for the realtime router.
//!
//! The handshake is authenticated before the upgrade; a refused token never
//! reaches the router. After the upgrade one task reads frames and drives the
//! router sequentially while a second task writes the user's broadcast events
//! and this connection's direct replies back to the socket.

use axum::{
  extract::{
    Query, State,
    ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
  },
  http::{HeaderMap, header},
  response::{IntoResponse, Response},
};
use futures_util::{SinkExt as _, StreamExt as _};
use rally_api::ApiError;
use rally_core::{store::RallyStore, user::Identity};
use serde::Deserialize;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use uuid::Uuid;

use crate::{AppState, auth::authenticate, events::ServerEvent, router::RealtimeRouter};

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
  pub token: Option<String>,
}

/// `GET /ws[?token=<token>]`
pub async fn ws_handler<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Query(params): Query<WsParams>,
  upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError>
where
  S: RallyStore + 'static,
{
  let raw = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .or(params.token.as_deref());

  let identity = authenticate(&state.keys, raw).map_err(|e| {
    tracing::info!(error = %e, "realtime handshake rejected");
    ApiError::Unauthorized(e.to_string())
  })?;

  let upgrade = match upgrade {
    Ok(upgrade) => upgrade,
    Err(rejection) => return Ok(rejection.into_response()),
  };

  let router = state.realtime.clone();
  Ok(upgrade.on_upgrade(move |socket| run_connection(socket, router, identity)))
}

async fn run_connection<S>(socket: WebSocket, router: RealtimeRouter<S>, identity: Identity)
where
  S: RallyStore + 'static,
{
  let connection_id = Uuid::new_v4();
  let user_id = identity.id;
  let mut events = router.connect(&identity, connection_id).await;

  let (mut sink, mut stream) = socket.split();
  let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerEvent>();

  let writer = tokio::spawn(async move {
    loop {
      let event = tokio::select! {
        reply = reply_rx.recv() => match reply {
          Some(event) => event,
          None => break,
        },
        event = events.recv() => match event {
          Ok(event) => event,
          Err(RecvError::Lagged(skipped)) => {
            tracing::warn!(user_id, %connection_id, skipped, "connection lagged, events dropped");
            continue;
          }
          Err(RecvError::Closed) => break,
        },
      };

      let text = match event.to_json() {
        Ok(text) => text,
        Err(e) => {
          tracing::error!(user_id, %connection_id, error = %e, "failed to encode event");
          continue;
        }
      };
      if sink.send(Message::Text(text.into())).await.is_err() {
        break;
      }
    }
  });

  while let Some(frame) = stream.next().await {
    let reply = match frame {
      Ok(Message::Text(text)) => router.handle_text(&identity, text.as_str()).await,
      Ok(Message::Binary(_)) => {
        Some(ServerEvent::message_error("Binary frames are not supported"))
      }
      Ok(Message::Close(_)) => break,
      Ok(Message::Ping(_) | Message::Pong(_)) => None,
      Err(e) => {
        tracing::debug!(user_id, %connection_id, error = %e, "socket read failed");
        break;
      }
    };
    if let Some(reply) = reply
      && reply_tx.send(reply).is_err()
    {
      break;
    }
  }

  router.disconnect(&identity, connection_id).await;
  writer.abort();
}
