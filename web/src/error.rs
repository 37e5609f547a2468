//! HTTP error mapping.
//!
//! Handlers return `Result<_, AppError>`. Domain errors convert with `?`, and
//! storage failures are logged with their source and answered with a generic
//! message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rush_core::DispatchError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// User-facing message
    message: String,
    /// Stable machine-readable code
    code: &'static str,
    /// Field the error refers to, if any
    field: Option<&'static str>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Creates an error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            field: None,
            source: None,
        }
    }

    /// Attaches an internal cause that is logged but never returned.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 for malformed input.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 401.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 403.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// 404.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{resource} not found"))
    }

    /// 409.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// 500 with a generic message.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }

    /// 503.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation { field, message } => {
                let mut app = Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message);
                app.field = Some(field);
                app
            }
            DispatchError::ItemMismatch => {
                let mut app = Self::new(StatusCode::BAD_REQUEST, "ITEM_MISMATCH", err.to_string());
                app.field = Some("items");
                app
            }
            DispatchError::InvalidTransition { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_TRANSITION", err.to_string())
            }
            DispatchError::PaymentMissing => {
                Self::new(StatusCode::BAD_REQUEST, "PAYMENT_MISSING", err.to_string())
            }
            DispatchError::NotFound { resource } => Self::not_found(resource),
            DispatchError::Conflict(message) => Self::conflict(message),
            DispatchError::PermissionDenied(message) => Self::forbidden(message),
            DispatchError::Unauthenticated => Self::unauthorized("Authentication required"),
            DispatchError::Storage(detail) => {
                Self::internal().with_source(anyhow::anyhow!(detail))
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal().with_source(err)
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            field: self.field,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rush_core::OrderStatus;

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (DispatchError::validation("quantity", "must be at least 1"), StatusCode::BAD_REQUEST),
            (DispatchError::ItemMismatch, StatusCode::BAD_REQUEST),
            (
                DispatchError::InvalidTransition {
                    from: OrderStatus::Created,
                    to: OrderStatus::Delivered,
                },
                StatusCode::BAD_REQUEST,
            ),
            (DispatchError::PaymentMissing, StatusCode::BAD_REQUEST),
            (DispatchError::not_found("order"), StatusCode::NOT_FOUND),
            (DispatchError::Conflict("taken".into()), StatusCode::CONFLICT),
            (DispatchError::PermissionDenied("no".into()), StatusCode::FORBIDDEN),
            (DispatchError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (DispatchError::Storage("pool timed out".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_storage_detail_is_hidden() {
        let err = AppError::from(DispatchError::Storage("password=hunter2".into()));
        assert_eq!(err.to_string(), "[INTERNAL_SERVER_ERROR] An internal error occurred");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_keeps_field() {
        let err = AppError::from(DispatchError::validation("branch_id", "invalid branch"));
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.field, Some("branch_id"));
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] invalid branch");
    }
}
