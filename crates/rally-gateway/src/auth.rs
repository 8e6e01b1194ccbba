//! Bearer-token authentication for the HTTP API.
//!
//! Every `/api` request is verified independently; the decoded [`Identity`]
//! is inserted as a request extension for the handlers in `rally-api`.

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::header,
  middleware::Next,
  response::Response,
};
use rally_api::ApiError;
use rally_core::user::Identity;

use crate::token::{SessionKeys, TokenError, strip_bearer};

/// Verify a raw `Authorization` header (or `token` query) value.
pub fn authenticate(
  keys: &SessionKeys,
  raw: Option<&str>,
) -> Result<Identity, TokenError> {
  keys.verify(strip_bearer(raw)?)
}

/// Middleware: reject with 401 unless the request carries a valid token.
pub async fn require_session(
  State(keys): State<Arc<SessionKeys>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let raw = req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok());

  let identity = authenticate(&keys, raw).map_err(|e| {
    tracing::debug!(error = %e, path = %req.uri().path(), "request rejected");
    ApiError::Unauthorized(e.to_string())
  })?;

  req.extensions_mut().insert(identity);
  Ok(next.run(req).await)
}
