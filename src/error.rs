//! Unified error types for the proxy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Startup and configuration errors.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Upstream base URL could not be parsed.
    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP client construction error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while relaying a single request.
///
/// Every variant renders as a JSON body with at least an `error` field.
#[derive(Error, Debug)]
pub enum RelayError {
    /// `apiKey` absent, null, empty, or not a string.
    #[error("API key is required")]
    MissingApiKey,

    /// `model` present but not a string.
    #[error("model must be a string")]
    InvalidModel,

    /// Inbound body is valid JSON but not an object.
    #[error("Request body must be a JSON object")]
    NotAnObject,

    /// Inbound body is not valid JSON.
    #[error("Invalid JSON body")]
    InvalidJson(#[source] serde_json::Error),

    /// Network, DNS or TLS failure talking to upstream.
    #[error("upstream request failed")]
    Transport(#[source] reqwest::Error),

    /// Upstream answered with something that is not JSON.
    #[error("upstream returned a malformed response")]
    MalformedResponse(#[source] serde_json::Error),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        // The request url carries the caller's key.
        RelayError::Transport(err.without_url())
    }
}

impl RelayError {
    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingApiKey
            | RelayError::InvalidModel
            | RelayError::NotAnObject
            | RelayError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            RelayError::Transport(_) | RelayError::MalformedResponse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

/// JSON error body: `{ "error": ..., "details"?: ... }`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Short, fixed error message.
    pub error: String,
    /// Description of the underlying failure, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&RelayError> for ErrorBody {
    fn from(err: &RelayError) -> Self {
        match err {
            RelayError::MissingApiKey | RelayError::InvalidModel | RelayError::NotAnObject => {
                ErrorBody {
                    error: err.to_string(),
                    details: None,
                }
            }
            RelayError::InvalidJson(source) => ErrorBody {
                error: err.to_string(),
                details: Some(source.to_string()),
            },
            RelayError::Transport(_) | RelayError::MalformedResponse(_) => ErrorBody {
                error: "Internal server error".to_string(),
                details: Some(error_chain(err)),
            },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::from(&self))).into_response()
    }
}

/// Render an error and all of its sources as `outer: inner: root`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ProxyError>;
