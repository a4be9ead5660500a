//! event_enqueue and sync_trigger tool implementations.

use edgecache_client::{EventQueue, SyncTrigger};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EventEnqueueParams {
    /// Opaque JSON payload to buffer until the next sync.
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EventEnqueueOutput {
    pub id: i64,
    pub pending: usize,
}

pub async fn enqueue_impl(queue: &EventQueue, params: EventEnqueueParams) -> Result<CallToolResult, McpError> {
    if params.payload.is_null() {
        return Err(ToolError::InvalidInput("payload cannot be null".into()).into());
    }
    let id = queue.enqueue(&params.payload).await?;
    let pending = queue.pending().await?.len();
    json_result(&EventEnqueueOutput { id, pending })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncTriggerParams {
    /// Sync tag to wake, as configured by `sync_tag`.
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncTriggerOutput {
    /// False when the tag is unknown or sync is disabled.
    pub triggered: bool,
}

pub fn sync_trigger_impl(trigger: &SyncTrigger, params: SyncTriggerParams) -> Result<CallToolResult, McpError> {
    json_result(&SyncTriggerOutput { triggered: trigger.fire(&params.tag) })
}
