//! HTTP API handlers.

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::error::{error_chain, ErrorBody};
use crate::health::HealthStatus;
use crate::metrics::{self, RelayOutcome};
use crate::relay::{self, UpstreamClient};

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Upstream API client.
    pub client: UpstreamClient,
}

impl AppState {
    /// Create new app state.
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

/// Relay request body, for documentation.
///
/// Every field other than `apiKey` and `model` is forwarded upstream as-is.
#[derive(Debug, utoipa::ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Key for the upstream API.
    #[schema(example = "AIza...")]
    pub api_key: String,
    /// Upstream model; defaults to `gemini-1.5-flash`.
    #[schema(example = "gemini-1.5-flash")]
    pub model: Option<String>,
    /// Generation contents, forwarded unchanged.
    #[schema(value_type = Option<Vec<Object>>)]
    pub contents: Option<Vec<serde_json::Value>>,
    /// Generation config, forwarded unchanged.
    #[schema(value_type = Option<Object>)]
    pub generation_config: Option<serde_json::Value>,
}

/// Relay handler - forwards the body to `models/{model}:generateContent`.
#[utoipa::path(
    post,
    path = "/api/gemma",
    tag = "proxy",
    request_body = RelayRequest,
    responses(
        (status = 200, description = "Upstream response body, unchanged", body = serde_json::Value),
        (status = 400, description = "Missing API key or invalid body", body = ErrorBody),
        (status = 500, description = "Upstream unreachable or response not JSON", body = ErrorBody),
        (status = "default", description = "Upstream error status and body, unchanged", body = serde_json::Value),
    )
)]
pub async fn relay(State(state): State<AppState>, body: Bytes) -> Response {
    match relay::handle(&state.client, &body).await {
        Ok(response) => {
            metrics::inc_relay_requests(if response.is_error() {
                RelayOutcome::UpstreamError
            } else {
                RelayOutcome::Success
            });
            response.into_response()
        }
        Err(err) if err.is_client_error() => {
            warn!(error = %err, "Rejected relay request");
            metrics::inc_relay_requests(RelayOutcome::Rejected);
            err.into_response()
        }
        Err(err) => {
            error!(error = %error_chain(&err), "Relay failed");
            metrics::inc_relay_requests(RelayOutcome::Failed);
            err.into_response()
        }
    }
}

/// Health check handler - always returns 200.
#[utoipa::path(
    get,
    path = "/health",
    tag = "proxy",
    responses((status = 200, description = "Proxy is running", body = HealthStatus))
)]
pub async fn health() -> impl IntoResponse {
    metrics::inc_health_checks();
    Json(HealthStatus::now())
}
