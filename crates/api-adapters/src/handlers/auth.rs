use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::ApiResult;
use crate::session::{expired_cookie, session_cookie, Session};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    #[serde(alias = "display_name")]
    pub display_name: Option<String>,
}

/// Signs the user in, makes sure their profile exists, and sets the session cookie.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state.auth.sign_in(req.email, req.display_name);
    state.feed.ensure_profile(&user.id, &user.display_name).await?;

    let token = state.auth.issue_token(&user.id);
    state.metrics.logins.inc();
    info!(user_id = %user.id, "session issued");

    Ok((
        [(SET_COOKIE, session_cookie(&token, &state.cookies))],
        Json(json!({ "user": user })),
    ))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, expired_cookie(&state.cookies))],
        Json(json!({ "success": true })),
    )
}

pub async fn current_user(session: Session) -> Json<serde_json::Value> {
    Json(json!({ "user": session.0 }))
}
