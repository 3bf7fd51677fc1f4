//! # AppError
//!
//! Centralized error handling for WorldFeed.
//! Every port and service returns these; the HTTP layer maps them to status codes.

use thiserror::Error;

/// The primary error type for all domain and service operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Referenced entity is absent (e.g., Community, News item)
    #[error("{0} not found")]
    NotFound(&'static str, String),

    /// Malformed or missing input
    #[error("{0}")]
    ValidationError(String),

    /// Missing or invalid session
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A newer document was written to the bucket since it was loaded
    #[error("conflict: {0}")]
    Conflict(String),

    /// A third-party API (verification, payments) rejected the request
    #[error("upstream request failed with status {status}")]
    Upstream { status: u16, body: serde_json::Value },

    /// Infrastructure failure (e.g., pinning service down, disk error)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound(entity, id.into())
    }

    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{context}: {err}"))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// A specialized Result type for WorldFeed logic.
pub type Result<T> = std::result::Result<T, AppError>;
