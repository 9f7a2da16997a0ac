//! Relay module: forwards `/api/gemma` calls to the upstream API.
//!
//! This module handles:
//! - Inbound body parsing and field stripping
//! - Upstream URL construction and the single forwarding attempt
//! - Verbatim relay of upstream status and body

pub mod client;
pub mod request;
pub mod response;

pub use client::UpstreamClient;
pub use request::{ForwardRequest, STRIPPED_FIELDS};
pub use response::UpstreamResponse;

use crate::error::RelayError;

/// Parse a raw inbound body and relay it upstream.
///
/// Validation failures return before any upstream call is made.
pub async fn handle(client: &UpstreamClient, body: &[u8]) -> Result<UpstreamResponse, RelayError> {
    let request = ForwardRequest::from_slice(body)?;
    client.forward(&request).await
}
