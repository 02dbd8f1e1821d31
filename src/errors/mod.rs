//! Error handling module for the tender backend.
//!
//! Every failure a service can report is one `AppError` kind. The transport layer
//! only maps kinds to HTTP status codes and response envelopes, it never inspects
//! persistence errors itself.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const IDENTITY_NOT_FOUND: &str = "IDENTITY_NOT_FOUND";
    pub const ORGANIZATION_NOT_FOUND: &str = "ORGANIZATION_NOT_FOUND";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const VERSION_CONFLICT: &str = "VERSION_CONFLICT";
    pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Message returned to callers for any unexpected persistence failure.
const OPAQUE_INTERNAL_MESSAGE: &str = "internal server error";

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Username has no matching employee
    #[error("identity not found: {0}")]
    IdentityNotFound(String),
    /// Employee has no organization link needed for the operation
    #[error("organization not found: {0}")]
    OrganizationNotFound(String),
    /// Entity id or version number does not exist
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// Identity resolved but not allowed to perform the operation
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Malformed request input
    #[error("validation failed: {0}")]
    Validation(String),
    /// Two writers raced for the same version number
    #[error("version conflict: {message}")]
    Conflict {
        message: String,
        current_version: i64,
    },
    /// Capability without a defined business rule yet
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// Persistence collaborator unreachable
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// Any other persistence failure; the payload is for logs only
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::IdentityNotFound(_) => StatusCode::UNAUTHORIZED,
            AppError::OrganizationNotFound(_) => StatusCode::FORBIDDEN,
            AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::IdentityNotFound(_) => codes::IDENTITY_NOT_FOUND,
            AppError::OrganizationNotFound(_) => codes::ORGANIZATION_NOT_FOUND,
            AppError::ResourceNotFound(_) => codes::NOT_FOUND,
            AppError::Forbidden(_) => codes::FORBIDDEN,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict { .. } => codes::VERSION_CONFLICT,
            AppError::NotImplemented(_) => codes::NOT_IMPLEMENTED,
            AppError::StoreUnavailable(_) => codes::SERVICE_UNAVAILABLE,
            AppError::Unexpected(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the caller-facing error message.
    pub fn message(&self) -> String {
        match self {
            AppError::IdentityNotFound(msg)
            | AppError::OrganizationNotFound(msg)
            | AppError::ResourceNotFound(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::NotImplemented(msg) => msg.clone(),
            AppError::Conflict { message, .. } => message.clone(),
            AppError::StoreUnavailable(_) => "service currently is not available".to_string(),
            AppError::Unexpected(_) => OPAQUE_INTERNAL_MESSAGE.to_string(),
        }
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => {
                tracing::error!("Database connection lost: {:?}", err);
                AppError::StoreUnavailable(err.to_string())
            }
            sqlx::Error::RowNotFound => AppError::ResourceNotFound("no such record".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                tracing::warn!("Unique constraint violated: {}", db.message());
                AppError::Conflict {
                    message: "Concurrent modification detected".to_string(),
                    current_version: 0,
                }
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                AppError::Unexpected(format!("Database error: {}", other))
            }
        }
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::Conflict {
                current_version, ..
            } => Some(serde_json::json!({ "currentVersion": current_version })),
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
