//! Error types for web handlers.
//!
//! Bridges domain and infrastructure errors to HTTP responses through
//! Axum's `IntoResponse`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Carries the status, a machine-readable code and a user-facing message.
/// Errors a client may simply repeat (timeouts, unavailable storage) are
/// flagged `retryable` so clients can offer "try again" instead of treating
/// the request as refused.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Summary>, AppError> {
///     let counts = store.counts().await
///         .map_err(|e| AppError::unavailable("Store unavailable").with_source(e.into()))?;
///     Ok(Json(counts.into()))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Whether repeating the same request may succeed
    retryable: bool,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            retryable: false,
            source: None,
        }
    }

    /// Attach the underlying error (logged, never sent to the client).
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Mark the error as retryable.
    #[must_use]
    pub const fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether a client may repeat the request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a retryable 408 Request Timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            message.into(),
            "TIMEOUT".to_string(),
        )
        .retryable()
    }

    /// Create a retryable 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
        .retryable()
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

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() || self.status == StatusCode::REQUEST_TIMEOUT {
            let error = self.source.as_ref().map(|e| format!("{e:#}"));
            tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                error = error.as_deref().unwrap_or("none"),
                "Request failed"
            );
            ::metrics::counter!("http.errors.total", "code" => self.code.clone()).increment(1);
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            retryable: self.retryable,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn display_includes_code() {
        let err = AppError::validation("Invalid namespace");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] Invalid namespace");
    }

    #[test]
    fn timeout_and_unavailable_are_retryable() {
        let timeout = AppError::timeout("Check-in timed out");
        assert_eq!(timeout.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(timeout.code(), "TIMEOUT");
        assert!(timeout.is_retryable());

        let unavailable = AppError::unavailable("Store down");
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(unavailable.is_retryable());

        assert!(!AppError::validation("limit").is_retryable());
    }

    #[tokio::test]
    async fn retryable_flag_is_serialized() {
        let response = AppError::unavailable("Store down").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn non_retryable_errors_omit_the_flag() {
        let body = body_json(AppError::validation("nope").into_response()).await;
        assert_eq!(body["message"], "nope");
        assert!(body.get("retryable").is_none());
    }

    #[test]
    fn source_is_kept_for_logging() {
        let err = AppError::unavailable("Store down").with_source(anyhow::anyhow!("pool closed"));
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("pool closed".to_string())
        );
    }
}
