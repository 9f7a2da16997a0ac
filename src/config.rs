//! Application configuration loaded from environment variables.

use axum::http::HeaderValue;
use serde::Deserialize;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// HTTP port the proxy listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed to call the proxy from a browser (comma separated).
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    // === Upstream ===
    /// Base URL of the generative-language API, up to the version segment.
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    /// Model used when the caller does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,

    // === Logging ===
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Log output format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,

    // === Metrics ===
    /// Expose a Prometheus scrape endpoint.
    #[serde(default)]
    pub metrics_enabled: bool,

    /// Port for the Prometheus exporter.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_port() -> u16 {
    3001
}

fn default_allowed_origins() -> Vec<String> {
    [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_upstream_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            upstream_base_url: default_upstream_base_url(),
            default_model: default_model(),
            rust_log: default_log_level(),
            log_format: default_log_format(),
            verbose: false,
            metrics_enabled: false,
            metrics_port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Build configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        let base = Url::parse(&self.upstream_base_url)
            .map_err(|e| format!("UPSTREAM_BASE_URL is not a valid url: {e}"))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err("UPSTREAM_BASE_URL must use http or https".to_string());
        }

        if self.default_model.trim().is_empty() {
            return Err("DEFAULT_MODEL must not be empty".to_string());
        }

        for origin in &self.allowed_origins {
            HeaderValue::from_str(origin)
                .map_err(|_| format!("ALLOWED_ORIGINS contains an invalid origin: {origin}"))?;
        }

        if self.metrics_enabled && self.metrics_port == self.port && self.port != 0 {
            return Err("METRICS_PORT must differ from PORT".to_string());
        }

        Ok(())
    }

    /// Whether logs should be emitted as JSON.
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
