//! Operator endpoints. Mounted only when debug routes are enabled.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use services::maintenance::{DataDump, MigrationReport, PinListing, SeedReport};

use crate::error::{ApiError, ApiResult};
use crate::session::Session;
use crate::state::AppState;

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    state.maintenance.clear_cache().await;
    Json(json!({ "success": true, "message": "Cache cleared" }))
}

pub async fn reload(State(state): State<AppState>, session: Session) -> Json<Value> {
    let viewer = session.viewer();
    let summary = state.maintenance.reload(viewer.as_ref()).await;
    Json(json!({
        "success": true,
        "message": "Cache cleared and data reloaded",
        "data": {
            "communities": summary.communities,
            "news": summary.news,
        },
    }))
}

pub async fn seed_usage() -> Json<Value> {
    Json(json!({
        "message": "POST to this endpoint to seed demo data",
        "note": "You must be logged in to seed data",
    }))
}

pub async fn seed(State(state): State<AppState>, session: Session) -> ApiResult<Json<SeedReport>> {
    let user = session
        .viewer()
        .ok_or_else(|| ApiError::unauthorized("Unauthorized - please log in first"))?;
    Ok(Json(state.maintenance.seed(&user).await))
}

pub async fn data(State(state): State<AppState>, session: Session) -> Json<DataDump> {
    let viewer = session.viewer();
    Json(state.maintenance.dump(viewer.as_ref()).await)
}

pub async fn pins(State(state): State<AppState>) -> ApiResult<Json<PinListing>> {
    Ok(Json(state.maintenance.pins().await?))
}

pub async fn migrate(State(state): State<AppState>, session: Session) -> Json<MigrationReport> {
    let viewer = session.viewer();
    Json(state.maintenance.migrate(viewer.as_ref()).await)
}
