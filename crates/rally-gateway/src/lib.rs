//! The rally server: session tokens, presence, realtime routing and the HTTP
//! surface.
//!
//! [`router`] assembles everything into one axum [`Router`]:
//!
//! | Path | Notes |
//! |------|-------|
//! | `GET /health` | Unauthenticated store ping |
//! | `GET /ws` | WebSocket; token in `Authorization` or `?token=` |
//! | `/api/...` | [`rally_api`] handlers behind bearer auth |

pub mod auth;
pub mod error;
pub mod events;
pub mod presence;
pub mod router;
pub mod token;
pub mod ws;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::State,
  http::StatusCode,
  middleware,
  response::IntoResponse,
  routing::get,
};
use rally_core::store::{Backend, RallyStore};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use presence::PresenceRegistry;
use router::RealtimeRouter;
use token::SessionKeys;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_token_ttl_secs() -> u64 { 24 * 60 * 60 }

/// Runtime server configuration, deserialised from `config.toml` and
/// `RALLY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:           String,
  pub port:           u16,
  pub store_path:     PathBuf,
  /// Hex-encoded HMAC key, at least 32 bytes once decoded.
  pub token_secret:   String,
  #[serde(default = "default_token_ttl_secs")]
  pub token_ttl_secs: u64,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through the gateway's own handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub keys:     Arc<SessionKeys>,
  pub realtime: RealtimeRouter<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      keys:     self.keys.clone(),
      realtime: self.realtime.clone(),
    }
  }
}

impl<S> AppState<S>
where
  S: RallyStore + 'static,
{
  pub fn new(store: Arc<S>, keys: SessionKeys) -> Self {
    let presence = Arc::new(PresenceRegistry::default());
    Self {
      realtime: RealtimeRouter::new(store.clone(), presence),
      keys: Arc::new(keys),
      store,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the complete server router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RallyStore + 'static,
{
  let api = rally_api::api_router(state.store.clone()).layer(
    middleware::from_fn_with_state(state.keys.clone(), auth::require_session),
  );

  Router::new()
    .route("/health", get(health::<S>))
    .route("/ws", get(ws::ws_handler::<S>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

/// `GET /health`
async fn health<S>(State(state): State<AppState<S>>) -> impl IntoResponse
where
  S: RallyStore + 'static,
{
  match Backend::ping(state.store.as_ref()).await {
    Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
    Err(e) => {
      tracing::error!(error = %e, "health check failed");
      (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unavailable" })),
      )
    }
  }
}

// ─── Integration tests ───────────────────────────────────────────────────────
