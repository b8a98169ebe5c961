//! Error types with HTTP status code mapping.
//!
//! [`RadarError`] is the central error type. Each variant maps to a
//! numeric code and an HTTP status for the webhook boundary. Enrichment
//! fetch failures are classified separately by [`FetchError`] so the
//! retry policy can tell transient failures from client errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "unauthorized webhook delivery"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Failure of a single call to an external enrichment source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The source rejected the request (not found, bad request). Not retried.
    #[error("client error {status}: {message}")]
    Client {
        /// HTTP status or RPC error code.
        status: u16,
        /// Message from the source.
        message: String,
    },

    /// Network failure, timeout, rate limit or server error. Retried.
    #[error("transient error: {0}")]
    Transient(String),

    /// The response could not be decoded. Not retried.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Returns `true` if a retry may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classifies an HTTP status code returned by a source.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || status >= 500 {
            Self::Transient(format!("{status}: {message}"))
        } else {
            Self::Client { status, message }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), err.to_string()),
            None => Self::Transient(err.to_string()),
        }
    }
}

/// Service-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status               |
/// |-----------|-------------------|---------------------------|
/// | 1000–1999 | Request           | 400 / 401                 |
/// | 2000–2999 | Backpressure      | 503 Service Unavailable   |
/// | 3000–3999 | Server            | 500 Internal Server Error |
/// | 4000–4999 | External services | 502 Bad Gateway           |
#[derive(Debug, thiserror::Error)]
pub enum RadarError {
    /// The webhook shared secret did not match.
    #[error("unauthorized webhook delivery")]
    Unauthorized,

    /// The webhook body could not be parsed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The ingestion queue is at capacity.
    #[error("ingest queue full; retry later")]
    QueueFull,

    /// Storage collaborator failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Enrichment source failure.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Notification collaborator failure.
    #[error("notify error: {0}")]
    Notify(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RadarError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidPayload(_) => 1001,
            Self::Unauthorized => 1002,
            Self::QueueFull => 2001,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Config(_) => 3002,
            Self::Fetch(_) => 4001,
            Self::Notify(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            Self::Fetch(_) | Self::Notify(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceError(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for RadarError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for RadarError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(FetchError::from_status(500, "boom").is_retryable());
        assert!(FetchError::from_status(503, "busy").is_retryable());
        assert!(FetchError::from_status(429, "slow down").is_retryable());
        assert!(!FetchError::from_status(404, "missing").is_retryable());
        assert!(!FetchError::from_status(400, "bad").is_retryable());
        assert!(!FetchError::Decode("bad json".to_string()).is_retryable());
    }

    #[test]
    fn http_mapping() {
        assert_eq!(RadarError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(RadarError::QueueFull.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            RadarError::InvalidPayload("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RadarError::QueueFull.error_code(), 2001);
    }

    #[test]
    fn fetch_error_converts() {
        let err: RadarError = FetchError::Transient("timeout".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("timeout"));
    }
}
