//! Generative-language API client.

use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::{error_chain, ProxyError, RelayError};
use crate::metrics;

use super::request::ForwardRequest;
use super::response::UpstreamResponse;

/// Method suffix appended to the model path segment.
const GENERATE_CONTENT: &str = "generateContent";

/// Query parameter carrying the API key.
const KEY_PARAM: &str = "key";

/// Client for the upstream `models/{model}:generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL up to the API version, e.g. `.../v1beta`.
    base_url: Url,
    /// Model used when the request names none.
    default_model: String,
}

impl UpstreamClient {
    /// Create a client from config.
    ///
    /// No request timeout is set; the transport defaults apply.
    pub fn new(config: &Config) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gemma-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Self::with_http_client(http, config)
    }

    /// Create a client around an existing HTTP client.
    pub fn with_http_client(http: reqwest::Client, config: &Config) -> Result<Self, ProxyError> {
        let base_url = Url::parse(&config.upstream_base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ProxyError::InvalidConfig(format!(
                "UPSTREAM_BASE_URL cannot be used as a base: {}",
                config.upstream_base_url
            )));
        }

        Ok(Self {
            http,
            base_url,
            default_model: config.default_model.clone(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Build `{base}/models/{model}:generateContent?key={api_key}`.
    ///
    /// The model is encoded as a single path segment.
    pub fn endpoint_url(&self, model: &str, api_key: &str) -> Url {
        let mut url = self.base_url.clone();
        // Construction rejects cannot-be-a-base urls, so segments are always editable.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("models")
                .push(&format!("{model}:{GENERATE_CONTENT}"));
        }
        url.query_pairs_mut().append_pair(KEY_PARAM, api_key);
        url
    }

    /// Forward a request upstream and capture its response.
    ///
    /// Single attempt. Non-2xx upstream answers are returned as `Ok`; only
    /// transport and parse failures are errors.
    #[instrument(skip(self, request), fields(model = %request.model_or(&self.default_model)))]
    pub async fn forward(&self, request: &ForwardRequest) -> Result<UpstreamResponse, RelayError> {
        let model = request.model_or(&self.default_model);
        let url = self.endpoint_url(model, &request.api_key);

        info!(url = %redact_key(&url), "Forwarding request upstream");
        debug!(
            body = %serde_json::Value::Object(request.remainder.clone()),
            "Outbound request body"
        );

        let _timer = metrics::timer_upstream(model, &self.default_model);

        // `json` sets `Content-Type: application/json`.
        let response = self
            .http
            .post(url)
            .json(&request.remainder)
            .send()
            .await
            .map_err(RelayError::from)
            .inspect_err(|e| error!(error = %error_chain(e), "Upstream request failed"))?;

        let status = response.status();
        let bytes = response.bytes().await?;

        let relayed = UpstreamResponse::from_parts(status, &bytes).inspect_err(|e| {
            error!(status = %status, error = %e, "Upstream response was not JSON");
        })?;

        if relayed.is_error() {
            warn!(status = %status, body = %relayed.body, "Upstream API error");
        } else {
            info!(status = %status, "Upstream API success");
            debug!(body = %relayed.body, "Upstream response body");
        }

        Ok(relayed)
    }
}

/// Copy of `url` with the `key` query value masked, for logging.
pub fn redact_key(url: &Url) -> Url {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == KEY_PARAM { "***".into() } else { v };
            (k.into_owned(), v.into_owned())
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted
}
