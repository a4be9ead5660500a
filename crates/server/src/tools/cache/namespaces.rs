//! cache_namespaces tool implementation.
//!
//! Lists every namespace with entry counts and marks the current ones.

use edgecache_client::ProxyState;
use edgecache_core::cache::NamespaceStats;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheNamespacesOutput {
    pub static_namespace: String,
    pub dynamic_namespace: String,
    pub namespaces: Vec<NamespaceSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceSummary {
    #[serde(flatten)]
    pub stats: NamespaceStats,
    /// True for the namespaces of the running version.
    pub current: bool,
}

pub async fn namespaces_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    let tags = state.tags();
    let namespaces = state
        .db()
        .namespace_stats()
        .await?
        .into_iter()
        .map(|stats| NamespaceSummary { current: tags.is_current(&stats.name), stats })
        .collect();

    json_result(&CacheNamespacesOutput {
        static_namespace: state.static_namespace(),
        dynamic_namespace: state.dynamic_namespace(),
        namespaces,
    })
}
