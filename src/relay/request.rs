//! Inbound request parsing.

use serde_json::{Map, Value};

use crate::error::RelayError;

/// Body field carrying the caller's API key.
pub const API_KEY_FIELD: &str = "apiKey";

/// Body field naming the upstream model.
pub const MODEL_FIELD: &str = "model";

/// Fields consumed by the proxy and never forwarded upstream.
pub const STRIPPED_FIELDS: [&str; 2] = [API_KEY_FIELD, MODEL_FIELD];

/// A validated relay request.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRequest {
    /// Caller-supplied key, forwarded as the `key` query parameter.
    pub api_key: String,
    /// Model name; `None` means the configured default.
    pub model: Option<String>,
    /// Everything else in the inbound body, forwarded unmodified.
    pub remainder: Map<String, Value>,
}

impl ForwardRequest {
    /// Parse a raw inbound body.
    ///
    /// An empty body is read as `{}` and therefore fails on the missing key.
    pub fn from_slice(body: &[u8]) -> Result<Self, RelayError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::from_value(Value::Object(Map::new()));
        }
        let value: Value = serde_json::from_slice(body).map_err(RelayError::InvalidJson)?;
        Self::from_value(value)
    }

    /// Split a JSON value into key, model and the forwarded remainder.
    pub fn from_value(value: Value) -> Result<Self, RelayError> {
        let Value::Object(mut remainder) = value else {
            return Err(RelayError::NotAnObject);
        };

        // `shift_remove` keeps the remaining keys in their original order.
        let [api_key, model] = STRIPPED_FIELDS.map(|field| remainder.shift_remove(field));

        let api_key = match api_key {
            Some(Value::String(key)) if !key.is_empty() => key,
            _ => return Err(RelayError::MissingApiKey),
        };

        let model = match model {
            None | Some(Value::Null) => None,
            Some(Value::String(model)) if model.is_empty() => None,
            Some(Value::String(model)) => Some(model),
            Some(_) => return Err(RelayError::InvalidModel),
        };

        Ok(Self {
            api_key,
            model,
            remainder,
        })
    }

    /// Model to call, falling back to `default`.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(default)
    }
}
