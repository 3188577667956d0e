use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors surfaced by the relay, config and interceptor endpoints.
///
/// Every variant is terminal for the request; nothing is retried.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or malformed target URL
    #[error("{0}")]
    InvalidInput(String),

    /// Settings document does not exist
    #[error("Configuration file not found")]
    ConfigMissing(String),

    /// Settings document exists but is not a JSON object
    #[error("Invalid configuration file")]
    ConfigInvalid(String),

    /// DNS, connect, TLS, timeout or redirect-limit failure talking to the target
    #[error("Proxy error: {0}")]
    UpstreamUnreachable(#[from] reqwest::Error),

    /// Intercepted media fetch failed
    #[error("Failed to fetch resource")]
    InterceptFailed(reqwest::Error),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Not found")]
    NotFound,
}

/// Body format for error responses.
///
/// The server variant answers JSON `{"error": ...}`, the edge variant plain text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorFormat {
    Json,
    PlainText,
}

impl RelayError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::ConfigMissing(_)
            | RelayError::ConfigInvalid(_)
            | RelayError::UpstreamUnreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::InterceptFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Render the error in the requested body format
    pub fn render(self, format: ErrorFormat) -> Response {
        let status = self.status();

        match &self {
            RelayError::ConfigMissing(path) => error!("Settings file not found: {}", path),
            RelayError::ConfigInvalid(detail) => error!("Settings file rejected: {}", detail),
            RelayError::UpstreamUnreachable(e) => error!("Upstream fetch failed: {}", e),
            RelayError::InterceptFailed(e) => error!("Intercepted fetch failed: {}", e),
            other => warn!("Request rejected ({}): {}", status, other),
        }

        // The interceptor always answers in plain text.
        let format = if matches!(self, RelayError::InterceptFailed(_)) {
            ErrorFormat::PlainText
        } else {
            format
        };

        let message = self.to_string();
        match format {
            ErrorFormat::Json => (status, Json(json!({ "error": message }))).into_response(),
            ErrorFormat::PlainText => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                message,
            )
                .into_response(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.render(ErrorFormat::Json)
    }
}
