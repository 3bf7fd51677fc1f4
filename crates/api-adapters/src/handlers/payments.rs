use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use services::{ConfirmOutcome, PaymentConfirmation, PaymentIntent, PaymentRequest};

use crate::error::ApiResult;
use crate::state::AppState;

/// Body of `POST /confirm-payment`: the wallet's success payload.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub payload: PaymentConfirmation,
}

pub async fn initiate(
    State(state): State<AppState>,
    Json(req): Json<PaymentRequest>,
) -> Json<PaymentIntent> {
    Json(state.payments.initiate(req))
}

/// 200 when the transaction checks out, 400 with the provider record otherwise.
pub async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<(StatusCode, Json<ConfirmOutcome>)> {
    let outcome = state.payments.confirm(req.payload).await?;
    if outcome.success {
        state.metrics.payment_confirmations.inc();
        Ok((StatusCode::OK, Json(outcome)))
    } else {
        Ok((StatusCode::BAD_REQUEST, Json(outcome)))
    }
}
