use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use services::{CommunityNews, NewCommunity};

use crate::error::ApiResult;
use crate::session::{ClaimedIdentity, Session};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateCommunityRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub identity: ClaimedIdentity,
}

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let communities = state.feed.list_communities().await;
    Json(json!({ "communities": communities }))
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateCommunityRequest>,
) -> ApiResult<Json<Value>> {
    let actor = session.actor(&req.identity)?;
    let community = state
        .feed
        .create_community(
            NewCommunity {
                name: req.name,
                description: req.description,
            },
            &actor,
        )
        .await?;
    state.metrics.communities_created.inc();
    Ok(Json(json!({ "community": community })))
}

pub async fn news(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Query(claimed): Query<ClaimedIdentity>,
) -> ApiResult<Json<CommunityNews>> {
    let viewer = session.viewer_or(&claimed);
    Ok(Json(state.feed.community_news(&id, viewer.as_ref()).await?))
}
