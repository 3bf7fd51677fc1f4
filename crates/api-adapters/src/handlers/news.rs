use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use domains::{AppError, IdentityProof};
use serde::Deserialize;
use serde_json::{json, Value};
use services::{NewNews, NewsFilter, UpvoteOutcome};
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::session::{ClaimedIdentity, Session};
use crate::state::AppState;

const DEFAULT_ACTION: &str = "verify";

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    pub community_id: Option<String>,
    pub author_id: Option<String>,
    #[serde(flatten)]
    pub identity: ClaimedIdentity,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateNewsRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub community_id: String,
    #[serde(default)]
    pub ipfs_hash: Option<String>,
    #[serde(flatten)]
    pub identity: ClaimedIdentity,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpvoteRequest {
    #[serde(flatten)]
    pub identity: ClaimedIdentity,
    #[serde(default)]
    pub payload: Option<IdentityProof>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub signal: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NewsQuery>,
) -> Json<Value> {
    let filter = NewsFilter {
        community_id: query.community_id.filter(|s| !s.is_empty()),
        author_id: query.author_id.filter(|s| !s.is_empty()),
    };
    let viewer = session.viewer_or(&query.identity);
    let news = state.feed.list_news(&filter, viewer.as_ref()).await;
    Json(json!({ "news": news }))
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateNewsRequest>,
) -> ApiResult<Json<Value>> {
    if [&req.title, &req.content, &req.community_id]
        .iter()
        .any(|f| f.trim().is_empty())
    {
        return Err(AppError::ValidationError("Missing required fields".into()).into());
    }
    let actor = session.actor(&req.identity)?;

    let news = state
        .feed
        .create_news(
            NewNews {
                title: req.title,
                content: req.content,
                community_id: req.community_id,
                ipfs_hash: req.ipfs_hash,
            },
            &actor,
        )
        .await?;
    state.metrics.posts_created.inc();
    Ok(Json(json!({ "news": news })))
}

/// Toggles the caller's upvote. The body is optional.
pub async fn upvote(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<UpvoteOutcome>> {
    let req: UpvoteRequest = if body.iter().all(u8::is_ascii_whitespace) {
        UpvoteRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::ValidationError(format!("Malformed request body: {e}")))?
    };
    let actor = session.actor(&req.identity)?;

    if let Some(proof) = &req.payload {
        match &state.identity {
            Some(verifier) => {
                let action = req.action.as_deref().unwrap_or(DEFAULT_ACTION);
                let identity = verifier.verify(proof, action, req.signal.clone()).await?;
                if session.0.is_some() {
                    state.auth.mark_verified(&actor.id, &identity.nullifier_hash);
                }
                info!(user_id = %actor.id, "identity proof accepted for upvote");
            }
            None => debug!(news_id = %id, "identity verification not configured, proof ignored"),
        }
    }

    let outcome = state.feed.toggle_upvote(&id, &actor).await?;
    state.metrics.upvote_toggles.inc();
    Ok(Json(outcome))
}
