//! Custom error types for the portal service

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the portal service
#[derive(Error, Debug)]
pub enum PortalError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Bad credentials, captcha or one-time code
    #[error("{0}")]
    Auth(String),

    /// Duplicate email or duplicate course selection
    #[error("{0}")]
    Conflict(String),

    /// Edit attempted on a record that is no longer pending
    #[error("{0}")]
    Locked(String),

    /// Unknown id or email
    #[error("{0}")]
    NotFound(String),

    /// One-time code past its expiry
    #[error("{0}")]
    Expired(String),

    /// Unknown or already used password reset token
    #[error("{0}")]
    InvalidToken(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Too many attempts for the same key
    #[error("Too many attempts. Try again later.")]
    TooManyRequests,

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl PortalError {
    /// Stable machine-readable code exposed to clients
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Validation(_) => "VALIDATION_ERROR",
            PortalError::Auth(_) => "AUTH_ERROR",
            PortalError::Conflict(_) => "CONFLICT",
            PortalError::Locked(_) => "LOCKED",
            PortalError::NotFound(_) => "NOT_FOUND",
            PortalError::Expired(_) => "EXPIRED",
            PortalError::InvalidToken(_) => "INVALID_TOKEN",
            PortalError::Forbidden(_) => "FORBIDDEN",
            PortalError::TooManyRequests => "TOO_MANY_REQUESTS",
            PortalError::Internal(_) | PortalError::Database(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::Auth(_) | PortalError::Expired(_) => StatusCode::UNAUTHORIZED,
            PortalError::Conflict(_) => StatusCode::CONFLICT,
            PortalError::Locked(_) | PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            PortalError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            PortalError::Internal(_) | PortalError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            PortalError::Internal(_) | PortalError::Database(_) => {
                error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for PortalError {
    fn from(rejection: JsonRejection) -> Self {
        PortalError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for PortalError {
    fn from(rejection: QueryRejection) -> Self {
        PortalError::Validation(rejection.body_text())
    }
}

/// Type alias for portal results
pub type PortalResult<T> = Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PortalError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PortalError::Expired("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(PortalError::Locked("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(PortalError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            PortalError::Database(DatabaseError::Migration("m".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response =
            PortalError::Internal("connection refused to 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "INTERNAL_ERROR");
        assert_eq!(body["message"], "Internal server error");
    }
}
