//! # minikit-adapters
//!
//! Clients for the wallet developer portal: identity-proof verification and
//! payment transaction lookup. Any non-2xx answer surfaces as
//! `AppError::Upstream` carrying the provider's body.

use std::time::Duration;

use async_trait::async_trait;
use domains::{AppError, IdentityProof, IdentityVerifier, PaymentVerifier, Result, VerifiedIdentity};
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "https://developer.worldcoin.org";

fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::internal("building developer portal client", e))
}

/// Reads a JSON body, mapping non-2xx statuses to `Upstream`.
async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::internal("reading developer portal response", e))?;
    let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));
    if status.is_success() {
        Ok(body)
    } else {
        warn!(status = status.as_u16(), body = %body, "developer portal rejected the request");
        Err(AppError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

fn is_hex(s: &str) -> bool {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
}

pub struct WorldIdVerifier {
    client: reqwest::Client,
    app_id: String,
    api_url: String,
}

impl WorldIdVerifier {
    pub fn new(app_id: impl Into<String>, api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: client(timeout)?,
            app_id: app_id.into(),
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for WorldIdVerifier {
    async fn verify(
        &self,
        proof: &IdentityProof,
        action: &str,
        signal: Option<String>,
    ) -> Result<VerifiedIdentity> {
        let mut body = json!({
            "nullifier_hash": proof.nullifier_hash,
            "merkle_root": proof.merkle_root,
            "proof": proof.proof,
            "verification_level": proof.verification_level,
            "action": action,
        });
        // The portal expects a hashed signal; raw strings are not forwarded.
        if let Some(signal) = signal.filter(|s| is_hex(s)) {
            body["signal_hash"] = Value::String(signal);
        }

        let url = format!("{}/api/v2/verify/{}", self.api_url.trim_end_matches('/'), self.app_id);
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::internal("identity verification request failed", e))?;
        let answer = read_json(response).await?;

        let nullifier_hash = answer
            .get("nullifier_hash")
            .and_then(Value::as_str)
            .unwrap_or(proof.nullifier_hash.as_str())
            .to_string();
        info!(action, nullifier_hash = %nullifier_hash, "identity proof verified");
        Ok(VerifiedIdentity { nullifier_hash })
    }
}

pub struct DevPortalPayments {
    client: reqwest::Client,
    app_id: String,
    api_key: SecretString,
    api_url: String,
}

impl DevPortalPayments {
    pub fn new(
        app_id: impl Into<String>,
        api_key: SecretString,
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: client(timeout)?,
            app_id: app_id.into(),
            api_key,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl PaymentVerifier for DevPortalPayments {
    async fn transaction(&self, transaction_id: &str) -> Result<Value> {
        let url = format!(
            "{}/api/v2/minikit/transaction/{}",
            self.api_url.trim_end_matches('/'),
            transaction_id
        );
        let response = self
            .client
            .get(url)
            .query(&[("app_id", self.app_id.as_str())])
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.expose_secret()))
            .send()
            .await
            .map_err(|e| AppError::internal("transaction lookup failed", e))?;
        read_json(response).await
    }
}
