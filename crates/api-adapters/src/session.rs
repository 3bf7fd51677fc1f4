//! Session cookie handling and caller identity.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use domains::{Actor, User};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::{AppState, CookieSettings};

pub const SESSION_COOKIE: &str = "worldfeed_session";

/// Reads the session token from any `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, settings: &CookieSettings) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        settings.max_age_secs
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(settings: &CookieSettings) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    if settings.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Identity a client may claim in a request body or query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimedIdentity {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_display_name: Option<String>,
}

impl ClaimedIdentity {
    /// Both halves present and non-blank.
    pub fn actor(&self) -> Option<Actor> {
        let id = self.user_id.as_deref().map(str::trim).unwrap_or_default();
        let name = self
            .user_display_name
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        if id.is_empty() || name.is_empty() {
            return None;
        }
        Some(Actor::new(id, name))
    }
}

/// The user behind the request's session cookie, if any.
pub struct Session(pub Option<User>);

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = session_token(&parts.headers).and_then(|token| state.auth.resolve(&token));
        Ok(Session(user))
    }
}

impl Session {
    pub fn viewer(&self) -> Option<Actor> {
        self.0.as_ref().map(User::actor)
    }

    /// Reader identity: the session, else a complete claimed pair, else anonymous.
    pub fn viewer_or(&self, claimed: &ClaimedIdentity) -> Option<Actor> {
        self.viewer().or_else(|| claimed.actor())
    }

    /// A valid session wins; otherwise the claimed pair must be complete.
    pub fn actor(&self, claimed: &ClaimedIdentity) -> Result<Actor, ApiError> {
        self.viewer_or(claimed)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}
