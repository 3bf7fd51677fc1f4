//! # Handlers
//!
//! Thin adapters between HTTP requests and the services. Identity comes from
//! the `Session` extractor; everything else is delegated.

pub mod auth;
pub mod communities;
pub mod debug;
pub mod news;
pub mod payments;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use domains::AppError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError(AppError::internal("encoding metrics", e)))?;
    Ok((
        [(CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
        body,
    ))
}
