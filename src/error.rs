// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// One side effect of approving a payment.
/// Reported on failure so reconciliation can tell the steps apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStep {
    StatusUpdate,
    GrantAccess,
    ApproveProfile,
}

impl fmt::Display for ApprovalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApprovalStep::StatusUpdate => "status_update",
            ApprovalStep::GrantAccess => "grant_access",
            ApprovalStep::ApproveProfile => "approve_profile",
        };
        f.write_str(name)
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (validation, rejected before any write)
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (no access grant, wrong role)
    Forbidden(String),

    // 404 Not Found (missing or inactive)
    NotFound(String),

    // 409 Conflict (entity not in the expected state)
    Conflict(String),

    // 503 Service Unavailable, safe to retry the same operation
    Transient(String),

    // 503, the payment is approved but a side effect did not apply
    ApprovalIncomplete {
        payment_id: i64,
        step: ApprovalStep,
        message: String,
    },
}

impl AppError {
    /// Whether the caller may repeat the same logical operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Transient(_) | AppError::ApprovalIncomplete { .. }
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ApprovalIncomplete {
                payment_id,
                step,
                message,
            } => write!(
                f,
                "payment {} approved but step '{}' failed: {}",
                payment_id, step, message
            ),
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Transient(msg) => {
                tracing::warn!("Transient failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "Service temporarily unavailable", "retryable": true }),
                )
            }
            AppError::ApprovalIncomplete {
                payment_id,
                step,
                message,
            } => {
                tracing::error!(payment_id, %step, "Approval side effect failed: {}", message);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({
                        "error": "Payment approved but access could not be fully applied",
                        "payment_id": payment_id,
                        "step": step,
                        "retryable": true,
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Classifies `sqlx::Error` so connection trouble is retryable
/// and constraint violations surface as conflicts.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => AppError::Transient(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::NotFound(db.message().to_string())
            }
            _ => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Transient("db down".into()).is_retryable());
        assert!(
            AppError::ApprovalIncomplete {
                payment_id: 1,
                step: ApprovalStep::GrantAccess,
                message: "boom".into(),
            }
            .is_retryable()
        );
        assert!(!AppError::Conflict("decided".into()).is_retryable());
        assert!(!AppError::Forbidden("no grant".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::Transient("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::Transient(_)));
    }
}
