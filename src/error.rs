//! Error taxonomy for the auth core.
//!
//! Every failure path returns a pre-formed `AuthError` variant that maps to a
//! fixed HTTP status and a `{ "error": ..., "details"?: ... }` JSON body, so
//! handlers can propagate it verbatim without re-wrapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, invalid, expired or revoked credential.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but insufficient scope or role.
    #[error("{0}")]
    Forbidden(String),

    /// Malformed request body or an operation that violates an invariant.
    #[error("{0}")]
    BadRequest(String),

    /// State conflict, e.g. a duplicate email or the last-owner guard.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation error")]
    Validation(#[from] validator::ValidationErrors),

    /// Rate budget exceeded for the request's category.
    #[error("{message}")]
    TooManyRequests {
        message: String,
        retry_after_seconds: u64,
        reset_at: DateTime<Utc>,
    },

    /// Infrastructure or deployment failure. Never exposes internals to the
    /// caller; the cause is logged at error level.
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AuthError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AuthError::Forbidden(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<mongodb::error::Error> for AuthError {
    fn from(err: mongodb::error::Error) -> Self {
        AuthError::Internal(anyhow::Error::new(err))
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        AuthError::Internal(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, details, retry_after) = match self {
            AuthError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None, None),
            AuthError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None, None),
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None, None),
            AuthError::Conflict(msg) => (StatusCode::CONFLICT, msg, None, None),
            AuthError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None, None),
            AuthError::Validation(errs) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                Some(json!(errs.to_string())),
                None,
            ),
            AuthError::TooManyRequests {
                message,
                retry_after_seconds,
                reset_at,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                message,
                Some(json!({
                    "retryAfter": retry_after_seconds,
                    "resetAt": reset_at.to_rfc3339(),
                })),
                Some(retry_after_seconds),
            ),
            AuthError::Internal(err) => {
                tracing::error!(error = %err, "Internal error in auth core");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                    None,
                )
            }
        };

        let mut res = (status, Json(ErrorResponse { error, details })).into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}
