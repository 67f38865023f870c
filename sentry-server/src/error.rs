//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sentry_core::SentryError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication error with specific error code
    #[error("{message}")]
    AuthError { message: String, code: String },

    /// Sentry core error - error from the matching engine
    #[error("Sentry error: {0}")]
    Sentry(#[from] SentryError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an authentication error with a specific error code
    pub fn auth_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::Sentry(ref e) => match e {
                // Client-provided invalid input → 400
                SentryError::Decode(_) => StatusCode::BAD_REQUEST,

                // Reference directory unreadable → 503
                SentryError::IndexRead { .. } => StatusCode::SERVICE_UNAVAILABLE,

                // Internal processing failures → 500
                SentryError::Persist { .. }
                | SentryError::WorkerPool(_)
                | SentryError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::AuthError { .. } => "AUTH_ERROR",
            Self::Sentry(ref e) => match e {
                SentryError::Decode(_) => "DECODE_FAILED",
                SentryError::Persist { .. } => "PERSIST_FAILED",
                SentryError::IndexRead { .. } => "INDEX_UNAVAILABLE",
                SentryError::WorkerPool(_) => "WORKER_POOL_ERROR",
                SentryError::Config(_) => "CONFIG_ERROR",
            },
        }
    }

    /// Code sent to the client; auth errors carry their own, more specific one
    fn response_code(&self) -> &str {
        match self {
            Self::AuthError { code, .. } => code,
            _ => self.error_code(),
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Keep filesystem paths and panic messages out of responses
            Self::Sentry(ref e) => match e {
                SentryError::Decode(_) => "Upload is not a decodable image".to_string(),
                SentryError::Persist { .. } => "Failed to store reference image".to_string(),
                SentryError::IndexRead { .. } => "Reference directory unavailable".to_string(),
                SentryError::WorkerPool(_) => "Image processing failed".to_string(),
                SentryError::Config(_) => "Server misconfigured".to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::AuthError { .. } => "auth_error",
            Self::Sentry(_) => "sentry",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::BadRequest(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::AuthError { .. } => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Authentication error"
                );
            }
            Self::Sentry(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    client_message = %client_message,
                    "Sentry error (internal details logged)"
                );
            }
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": self.response_code(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_persist_failure_maps_to_500() {
        let err = ApiError::from(SentryError::Persist {
            path: PathBuf::from("/srv/refs/1_a.png"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "PERSIST_FAILED");
        assert!(!err.client_message().contains("/srv/refs"));
    }

    #[test]
    fn test_auth_error_maps_to_401() {
        let err = ApiError::auth_error("AUTH_INVALID_TOKEN", "Invalid admin token");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.client_message(), "Invalid admin token");
    }

    #[test]
    fn test_bad_request() {
        let err = ApiError::bad_request("No file provided");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
