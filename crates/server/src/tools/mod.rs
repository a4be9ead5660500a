//! MCP tool implementations.
//!
//! Each tool is a plain async function over the shared proxy handles so it
//! can be exercised without an MCP transport.

pub mod cache;
pub mod events;
pub mod notify;
pub mod proxy_fetch;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

pub use events::{EventEnqueueParams, SyncTriggerParams};
pub use notify::{NotificationClickParams, PushNotifyParams};
pub use proxy_fetch::ProxyFetchParams;

/// Wrap a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
