//! Gemma API proxy.
//!
//! A minimal HTTP relay in front of Google's generative-language API. Callers
//! POST `{ apiKey, model?, ...rest }` to `/api/gemma`; the proxy strips the key
//! and model, forwards the rest to
//! `.../v1beta/models/{model}:generateContent?key={apiKey}`, and relays the
//! upstream status and JSON body unchanged.
//!
//! ```text
//! client ──POST /api/gemma──▶ proxy ──POST models/{model}:generateContent──▶ upstream
//!        ◀── status + body ──       ◀──────────── status + body ────────────
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`relay`]: Request parsing, upstream client, response relay
//! - [`health`]: Health status payload
//! - [`api`]: HTTP handlers, routes, and OpenAPI document
//! - [`server`]: Listener lifecycle
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod utils;

pub use config::Config;
pub use error::{ProxyError, RelayError, Result};
pub use server::{ProxyServer, RunningServer};
