//! # auth-adapters
//!
//! Cookie-session implementation of `AuthProvider`: HMAC-signed tokens over
//! an in-process user directory.

pub mod directory;
pub mod session;

use chrono::{Duration, Utc};
use domains::{AuthProvider, User};
use secrecy::SecretString;
use tracing::{debug, info, warn};

pub use directory::{generate_user_id, UserDirectory};
pub use session::{SessionCodec, SessionError};

const DEFAULT_DISPLAY_NAME: &str = "Demo User";

pub struct CookieAuthProvider {
    codec: SessionCodec,
    users: UserDirectory,
}

impl CookieAuthProvider {
    /// Without a secret, tokens are signed with a per-process key.
    pub fn new(secret: Option<&SecretString>, ttl: Duration) -> Self {
        let codec = match secret {
            Some(secret) => SessionCodec::new(secret, ttl),
            None => {
                warn!("no session secret configured, sessions will not survive a restart");
                SessionCodec::ephemeral(ttl)
            }
        };
        Self {
            codec,
            users: UserDirectory::new(),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.codec.ttl()
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }
}

impl AuthProvider for CookieAuthProvider {
    fn sign_in(&self, email: Option<String>, display_name: Option<String>) -> User {
        let display_name = display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let known = email.as_deref().and_then(|e| self.users.find_by_email(e));
        if let Some(user) = known {
            let user = match display_name {
                Some(name) => self
                    .users
                    .update(&user.id, |u| u.display_name = name)
                    .unwrap_or(user),
                None => user,
            };
            info!(user_id = %user.id, "known user signed in");
            return user;
        }

        let user = self
            .users
            .create(email, display_name.unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()));
        info!(user_id = %user.id, display_name = %user.display_name, "new user signed in");
        user
    }

    fn issue_token(&self, user_id: &str) -> String {
        self.codec.issue(user_id)
    }

    fn resolve(&self, token: &str) -> Option<User> {
        match self.codec.verify(token) {
            Ok(user_id) => self.users.get(&user_id),
            Err(err) => {
                debug!(error = %err, "session rejected");
                None
            }
        }
    }

    fn mark_verified(&self, user_id: &str, nullifier_hash: &str) -> Option<User> {
        self.users.update(user_id, |u| {
            u.world_id_verified = true;
            u.world_id_verified_at = Some(Utc::now());
            u.world_id_nullifier_hash = Some(nullifier_hash.to_string());
        })
    }
}
