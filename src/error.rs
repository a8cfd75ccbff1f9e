//! Error types for giftbox.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    // Gift access errors
    #[error("Access code required")]
    PinRequired { attempts_remaining: u32 },

    #[error("Gift is locked until {0}")]
    TimeLocked(String),

    #[error("Gift is not available")]
    GiftDisabled,

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // External service errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Webhook error: {0}")]
    Webhook(String),

    // Rate limiting
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 401
            Self::Unauthenticated
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::PinRequired { .. }
            | Self::Webhook(_) => StatusCode::UNAUTHORIZED,

            // 403
            Self::Forbidden | Self::GiftDisabled => StatusCode::FORBIDDEN,

            // 404
            Self::NotFound(_) => StatusCode::NOT_FOUND,

            // 409
            Self::AlreadyExists(_) => StatusCode::CONFLICT,

            // 400
            Self::Validation(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 423
            Self::TimeLocked(_) => StatusCode::LOCKED,

            // 429
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500
            Self::Database(_) | Self::Internal(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::PinRequired { .. } => "PIN_REQUIRED",
            Self::TimeLocked(_) => "TIME_LOCKED",
            Self::GiftDisabled => "GIFT_DISABLED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Webhook(_) => "WEBHOOK_ERROR",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = code, error = %message, "Request failed");
        }

        let mut error = json!({
            "code": code,
            "message": message,
        });
        match &self {
            Self::PinRequired { attempts_remaining } => {
                error["attempts_remaining"] = json!(attempts_remaining);
            }
            Self::RateLimitExceeded { retry_after_secs } => {
                error["retry_after_secs"] = json!(retry_after_secs);
            }
            _ => {}
        }

        let body = Json(json!({ "error": error }));

        match self {
            Self::RateLimitExceeded { retry_after_secs } => (
                status,
                [("Retry-After", retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gift_access_status_codes() {
        assert_eq!(
            Error::PinRequired { attempts_remaining: 2 }.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::TimeLocked("2030-01-01T00:00:00Z".into()).status_code(),
            StatusCode::LOCKED
        );
        assert_eq!(
            Error::RateLimitExceeded { retry_after_secs: 30 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(Error::GiftDisabled.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = Error::RateLimitExceeded { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "42");
    }
}
