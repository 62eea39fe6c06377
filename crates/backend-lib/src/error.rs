// crates/backend-lib/src/error.rs

//! Central error types + Axum integration.
//!
//! Component functions return their own narrow error (`VerificationError`,
//! `StoreError`, `ValidationError`); the HTTP layer folds them into
//! [`AppError`], whose response body only ever carries a sanitized message.
use authgate_common::{ApiResponse, ErrorBody};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::{PasswordError, TokenError};
use crate::validation::ValidationError;

/// A credential could not be turned into an identity claim.
///
/// Deliberately carries no reason: expired, forged, wrong algorithm and
/// malformed tokens must look the same to a caller. Call sites log the
/// reason before collapsing it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    #[error("invalid credential")]
    Invalid,
}

/// Profile store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("profile not found")]
    NotFound,

    #[error("profile already exists")]
    Conflict,

    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Only backend outages are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unavailable(format!("corrupt profile record: {err}"))
    }
}

/// Application error as seen by the transport layer
#[derive(Error, Debug)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "AUTH_001",
            AppError::NotFound => "NF_001",
            AppError::Conflict => "CONFLICT_001",
            AppError::StoreUnavailable(_) => "STORE_001",
            AppError::Validation(_) => "VAL_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for a response body
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Unauthorized => "Authentication failed".to_string(),
            AppError::NotFound => "Resource not found".to_string(),
            AppError::Conflict => "Resource already exists".to_string(),
            AppError::StoreUnavailable(_) => {
                "Service temporarily unavailable, please retry".to_string()
            },
            // validation messages describe the client's own input
            AppError::Validation(err) => err.to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

impl From<VerificationError> for AppError {
    fn from(_: VerificationError) -> Self {
        AppError::Unauthorized
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound,
            StoreError::Conflict => AppError::Conflict,
            StoreError::Unavailable(reason) => AppError::StoreUnavailable(reason),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(ValidationError::MalformedBody(rejection.body_text()))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Internal(detail) => tracing::error!(%detail, "request failed"),
            AppError::StoreUnavailable(detail) => tracing::warn!(%detail, "profile store unavailable"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        let body = ApiResponse::<()>::failure(ErrorBody {
            code: self.error_code().to_string(),
            message: self.sanitized_message(),
            retryable: self.is_retryable(),
        });

        (status, Json(body)).into_response()
    }
}
