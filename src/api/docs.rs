//! OpenAPI document for the HTTP surface.

use axum::Json;
use utoipa::OpenApi;

use super::handlers::{self, RelayRequest};
use crate::error::ErrorBody;
use crate::health::HealthStatus;

/// OpenAPI description of the proxy.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gemma API Proxy",
        description = "Relays generateContent calls to the Google generative-language API"
    ),
    paths(handlers::relay, handlers::health),
    components(schemas(RelayRequest, ErrorBody, HealthStatus)),
    tags((name = "proxy", description = "Relay and health endpoints"))
)]
pub struct ApiDoc;

/// Serve the OpenAPI document as JSON.
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
