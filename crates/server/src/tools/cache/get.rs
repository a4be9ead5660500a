//! cache_get tool implementation.
//!
//! Reads a cached entry for a URL without touching the network.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use edgecache_client::ProxyState;
use edgecache_core::{CacheEntry, RequestKey};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// URL of the cached GET request.
    pub url: String,

    /// Namespace to read. Defaults to the current dynamic, then static namespace.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub key: String,
    /// Namespace the entry was found in; absent on a miss.
    pub namespace: Option<String>,
    pub entry: Option<EntryView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntryView {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub captured_at: Option<String>,
    pub body_base64: String,
    pub bytes: usize,
}

impl From<CacheEntry> for EntryView {
    fn from(entry: CacheEntry) -> Self {
        Self {
            status: entry.status,
            captured_at: entry.captured_at().map(|t| t.to_rfc3339()),
            body_base64: STANDARD.encode(&entry.body),
            bytes: entry.body.len(),
            headers: entry.headers,
        }
    }
}

/// Implementation of the cache_get tool.
///
/// A named namespace that does not exist is an error; a miss is not.
pub async fn get_impl(state: &ProxyState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let key = RequestKey::get(&state.resolve_url(&params.url)?);

    let found = match params.namespace {
        Some(ns) => state.db().match_entry(&ns, &key).await?.map(|e| (ns, e)),
        None => {
            let mut found = None;
            for ns in [state.dynamic_namespace(), state.static_namespace()] {
                if let Some(entry) = state.lookup(&ns, &key).await {
                    found = Some((ns, entry));
                    break;
                }
            }
            found
        }
    };

    let (namespace, entry) = match found {
        Some((ns, entry)) => (Some(ns), Some(EntryView::from(entry))),
        None => (None, None),
    };
    json_result(&CacheGetOutput { key: key.to_string(), namespace, entry })
}
