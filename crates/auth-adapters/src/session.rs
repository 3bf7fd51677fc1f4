//! Signed session tokens.
//!
//! Format: `base64url(json{userId, timestamp}) "." base64url(HMAC-SHA256(payload_part))`.
//! The timestamp is the issue time in epoch milliseconds.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,
    #[error("session signature mismatch")]
    BadSignature,
    #[error("session expired")]
    Expired,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: String,
    timestamp: i64,
}

#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
    ttl: Duration,
}

impl SessionCodec {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        Self::from_key(secret.expose_secret().as_bytes(), ttl)
    }

    /// Per-process secret; sessions do not survive a restart.
    pub fn ephemeral(ttl: Duration) -> Self {
        let key = [Uuid::new_v4().into_bytes(), Uuid::new_v4().into_bytes()].concat();
        Self::from_key(&key, ttl)
    }

    fn from_key(key: &[u8], ttl: Duration) -> Self {
        // HMAC takes keys of any length
        let mac = HmacSha256::new_from_slice(key).expect("hmac key");
        Self { mac, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: &str) -> String {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: &str, at: DateTime<Utc>) -> String {
        let claims = serde_json::json!({ "userId": user_id, "timestamp": at.timestamp_millis() });
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// Returns the user id carried by a valid, fresh token.
    pub fn verify(&self, token: &str) -> Result<String, SessionError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        let (payload, signature) = token.split_once('.').ok_or(SessionError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SessionError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&raw).map_err(|_| SessionError::Malformed)?;

        let issued = DateTime::<Utc>::from_timestamp_millis(claims.timestamp).ok_or(SessionError::Malformed)?;
        if now - issued > self.ttl {
            return Err(SessionError::Expired);
        }
        Ok(claims.user_id)
    }
}
