//! Session tokens: HMAC-SHA256 signed identity claims.
//!
//! Wire format: `base64url(claims_json) "." base64url(hmac_sha256(claims_json))`,
//! both parts unpadded. Claims carry the user's identity plus `iat`/`exp` in
//! unix seconds.
//!
//! HTTP requests verify their token on every request. A realtime connection
//! verifies once at the handshake; a token that expires later does not close
//! an already-open connection.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rally_core::user::Identity;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Smallest accepted signing key, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
  id:       i64,
  email:    String,
  username: String,
  iat:      i64,
  exp:      i64,
}

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
  #[error("authentication token missing")]
  Missing,
  #[error("invalid token")]
  Invalid,
  #[error("token expired")]
  Expired,
}

/// Signing key plus token lifetime.
#[derive(Clone)]
pub struct SessionKeys {
  mac: HmacSha256,
  ttl: Duration,
}

impl SessionKeys {
  pub fn new(secret: &[u8], ttl_secs: u64) -> Result<Self> {
    if secret.len() < MIN_SECRET_BYTES {
      return Err(Error::Secret(format!(
        "need at least {MIN_SECRET_BYTES} bytes, got {}",
        secret.len()
      )));
    }
    let mac = HmacSha256::new_from_slice(secret)
      .map_err(|e| Error::Secret(e.to_string()))?;
    let ttl = i64::try_from(ttl_secs)
      .ok()
      .and_then(Duration::try_seconds)
      .ok_or_else(|| Error::Secret(format!("token ttl out of range: {ttl_secs}")))?;
    Ok(Self { mac, ttl })
  }

  /// Build keys from a hex-encoded secret, as stored in configuration.
  pub fn from_hex(secret_hex: &str, ttl_secs: u64) -> Result<Self> {
    let secret =
      hex::decode(secret_hex.trim()).map_err(|e| Error::Secret(e.to_string()))?;
    Self::new(&secret, ttl_secs)
  }

  pub fn issue(&self, identity: &Identity) -> Result<String> {
    self.issue_at(identity, Utc::now())
  }

  pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String> {
    let claims = Claims {
      id:       identity.id,
      email:    identity.email.clone(),
      username: identity.username.clone(),
      iat:      now.timestamp(),
      exp:      (now + self.ttl).timestamp(),
    };
    let payload = serde_json::to_vec(&claims)?;

    let mut mac = self.mac.clone();
    mac.update(&payload);
    let sig = mac.finalize().into_bytes();

    Ok(format!("{}.{}", B64.encode(&payload), B64.encode(sig)))
  }

  pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
    self.verify_at(token, Utc::now())
  }

  /// Check structure, then signature (constant time), then expiry.
  pub fn verify_at(
    &self,
    token: &str,
    now: DateTime<Utc>,
  ) -> Result<Identity, TokenError> {
    let (payload_b64, sig_b64) =
      token.split_once('.').ok_or(TokenError::Invalid)?;
    if sig_b64.contains('.') {
      return Err(TokenError::Invalid);
    }
    let payload = B64.decode(payload_b64).map_err(|_| TokenError::Invalid)?;
    let sig = B64.decode(sig_b64).map_err(|_| TokenError::Invalid)?;

    let mut mac = self.mac.clone();
    mac.update(&payload);
    mac.verify_slice(&sig).map_err(|_| TokenError::Invalid)?;

    let claims: Claims =
      serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)?;
    if claims.exp <= now.timestamp() {
      return Err(TokenError::Expired);
    }

    Ok(Identity {
      id:       claims.id,
      email:    claims.email,
      username: claims.username,
    })
  }
}

/// Extract the raw token from a header or query value, accepting an optional
/// `Bearer ` prefix.
pub fn strip_bearer(raw: Option<&str>) -> Result<&str, TokenError> {
  let raw = raw.unwrap_or_default().trim_start();
  let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
  if token.is_empty() {
    return Err(TokenError::Missing);
  }
  Ok(token)
}
