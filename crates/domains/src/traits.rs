//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bucket::{BlobRef, Bucket, PinnedBlob};
use crate::error::Result;
use crate::models::{Document, PostContent, User};

/// Document persistence contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persists a bucket document and returns its new reference.
    ///
    /// Fails with `AppError::Conflict` when the store already holds a document
    /// for `bucket` whose sequence is not lower than `document.sequence`.
    async fn store(&self, bucket: &Bucket, document: &Document) -> Result<BlobRef>;

    async fn retrieve(&self, reference: &BlobRef) -> Result<Document>;

    /// Newest document stored for `bucket`, if any.
    async fn latest(&self, bucket: &Bucket) -> Result<Option<PinnedBlob>>;

    /// Every WorldFeed document the store knows about, newest first.
    async fn list(&self) -> Result<Vec<PinnedBlob>>;

    /// Stores a standalone post-content blob.
    async fn store_content(&self, content: &PostContent) -> Result<BlobRef>;

    /// Short backend name for diagnostics ("local", "pinata").
    fn backend(&self) -> &'static str;
}

/// Identity and session contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthProvider: Send + Sync {
    /// Signs a user in by email, creating a new user when the email is unknown.
    fn sign_in(&self, email: Option<String>, display_name: Option<String>) -> User;

    /// Issues a session token for a known user id.
    fn issue_token(&self, user_id: &str) -> String;

    /// Resolves a session token to its user; `None` if invalid, stale, or unknown.
    fn resolve(&self, token: &str) -> Option<User>;

    /// Records a successful identity proof for the user.
    fn mark_verified(&self, user_id: &str, nullifier_hash: &str) -> Option<User>;
}

/// Proof payload produced by the wallet mini-app's verify command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProof {
    pub nullifier_hash: String,
    pub merkle_root: String,
    pub proof: String,
    #[serde(default = "default_verification_level")]
    pub verification_level: String,
}

fn default_verification_level() -> String {
    "orb".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub nullifier_hash: String,
}

/// Third-party identity-proof verification.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(
        &self,
        proof: &IdentityProof,
        action: &str,
        signal: Option<String>,
    ) -> Result<VerifiedIdentity>;
}

/// Third-party payment lookup.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// Fetches the provider's raw transaction record.
    async fn transaction(&self, transaction_id: &str) -> Result<serde_json::Value>;
}
