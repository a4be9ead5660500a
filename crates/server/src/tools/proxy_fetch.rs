//! proxy_fetch tool implementation.
//!
//! Runs one request through the proxy exactly as a host would: classified,
//! answered by its strategy, and cached where the strategy allows.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use edgecache_client::ProxyState;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// Absolute URL, or a root-relative path resolved against the origin base.
    pub url: String,

    /// HTTP method (default: GET). Only GET is cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers. `Accept` and `Cache-Control` influence strategy selection.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// Canonical request URL.
    pub url: String,
    pub status: u16,
    /// "cache", "network", or "sentinel".
    pub source: String,
    /// Strategy that answered; absent for pass-through requests.
    pub strategy: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Body as text when it is valid UTF-8.
    pub body: Option<String>,
    /// Body as base64 when it is not valid UTF-8.
    pub body_base64: Option<String>,
    pub bytes: usize,
}

/// Implementation of the proxy_fetch tool.
pub async fn proxy_fetch_impl(state: &ProxyState, params: ProxyFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let req = state.describe(&params.method, &params.url, params.headers)?;
    let response = state.dispatch(&req).await?;

    let (body, body_base64) = match std::str::from_utf8(&response.body) {
        Ok(text) => (Some(text.to_string()), None),
        Err(_) => (None, Some(STANDARD.encode(&response.body))),
    };

    let output = ProxyFetchOutput {
        url: req.url.to_string(),
        status: response.status,
        source: response.source.as_str().to_string(),
        strategy: response.strategy.map(|s| s.as_str().to_string()),
        headers: response.headers,
        body,
        body_base64,
        bytes: response.body.len(),
    };
    json_result(&output)
}
