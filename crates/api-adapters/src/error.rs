//! Maps domain errors onto HTTP responses with a `{error, details?}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::AppError;
use serde_json::{json, Value};
use tracing::{error, warn};

#[derive(Debug)]
pub struct ApiError(pub AppError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn unauthorized(message: &str) -> Self {
        Self(AppError::Unauthorized(message.to_string()))
    }

    fn parts(&self) -> (StatusCode, String, Option<Value>) {
        match &self.0 {
            AppError::NotFound(..) => (StatusCode::NOT_FOUND, self.0.to_string(), None),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.0.to_string(), None),
            AppError::Upstream { body, .. } => {
                (StatusCode::BAD_REQUEST, "Verification failed".to_string(), Some(body.clone()))
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = self.parts();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }

        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}
