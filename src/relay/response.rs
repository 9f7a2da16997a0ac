//! Upstream response relayed back to the caller.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::value::RawValue;

use crate::error::RelayError;

/// Status and JSON body produced by the upstream API.
#[derive(Debug)]
pub struct UpstreamResponse {
    /// Status reported to the caller.
    pub status: StatusCode,
    /// Exact JSON text returned by upstream.
    pub body: Box<RawValue>,
}

impl UpstreamResponse {
    /// Build from the raw upstream status and body.
    ///
    /// The body must be JSON. Successful statuses collapse to 200; failures
    /// keep the upstream status.
    pub fn from_parts(upstream_status: StatusCode, body: &[u8]) -> Result<Self, RelayError> {
        let text = std::str::from_utf8(body).map_err(|e| {
            RelayError::MalformedResponse(<serde_json::Error as serde::de::Error>::custom(format!(
                "response body is not valid UTF-8: {e}"
            )))
        })?;
        let body = RawValue::from_string(text.trim().to_owned())
            .map_err(RelayError::MalformedResponse)?;

        let status = if upstream_status.is_success() {
            StatusCode::OK
        } else {
            upstream_status
        };

        Ok(Self { status, body })
    }

    /// Whether upstream reported a failure.
    pub fn is_error(&self) -> bool {
        !self.status.is_success()
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            self.body.get().to_owned(),
        )
            .into_response()
    }
}
