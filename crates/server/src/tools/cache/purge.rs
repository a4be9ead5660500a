//! cache_purge tool implementation.
//!
//! Purges a single URL, a whole namespace, or expired dynamic entries.

use edgecache_client::{ExpirySweep, ProxyState};
use edgecache_core::RequestKey;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Purge the entry for this URL. Limited to `namespace` when given,
    /// otherwise removed from both current namespaces.
    #[serde(default)]
    pub url: Option<String>,

    /// Namespace to purge. Without `url` the whole namespace is deleted.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Run the expiry sweep over the dynamic namespace now.
    #[serde(default)]
    pub expired: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub deleted_entries: u64,
    pub deleted_namespaces: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(
    state: &ProxyState, sweep: &ExpirySweep, params: CachePurgeParams,
) -> Result<CallToolResult, McpError> {
    if params.url.is_none() && params.namespace.is_none() && !params.expired {
        return Err(ToolError::InvalidInput("at least one of url, namespace, or expired must be specified".into()).into());
    }

    let db = state.db();
    let mut output = CachePurgeOutput::default();

    match (params.url, params.namespace) {
        (Some(url), namespace) => {
            let key = RequestKey::get(&state.resolve_url(&url)?);
            let targets = match namespace {
                Some(ns) => vec![ns],
                None => vec![state.dynamic_namespace(), state.static_namespace()],
            };
            for ns in targets {
                if db.delete_entry(&ns, &key).await? {
                    output.deleted_entries += 1;
                }
            }
        }
        (None, Some(ns)) => {
            if db.delete_namespace(&ns).await? {
                output.deleted_namespaces.push(ns);
            }
        }
        (None, None) => {}
    }

    if params.expired {
        output.deleted_entries += sweep.run().await?;
    }

    tracing::info!(entries = output.deleted_entries, namespaces = output.deleted_namespaces.len(), "cache purged");
    json_result(&output)
}
