//! push_notify and notification_click tool implementations.
//!
//! Push data arrives either as JSON text or base64, mirroring the raw bytes a
//! push service would deliver.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use edgecache_client::{DisplayRequest, NotificationHook};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::host::PendingNotifications;
use crate::tools::json_result;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushNotifyParams {
    /// Push payload as UTF-8 text.
    #[serde(default)]
    pub data: Option<String>,

    /// Push payload as base64, for binary-safe delivery.
    #[serde(default)]
    pub data_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationView {
    pub title: String,
    pub body: String,
    pub tag: Option<String>,
    pub require_interaction: bool,
    pub url: Option<String>,
}

impl From<DisplayRequest> for NotificationView {
    fn from(r: DisplayRequest) -> Self {
        Self { title: r.title, body: r.body, tag: r.tag, require_interaction: r.require_interaction, url: r.url }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushNotifyOutput {
    /// The notification shown; absent when the payload was malformed.
    pub shown: Option<NotificationView>,
    pub pending: Vec<NotificationView>,
}

pub fn push_impl(
    hook: &NotificationHook, host: &Arc<PendingNotifications>, params: PushNotifyParams,
) -> Result<CallToolResult, McpError> {
    let data = match (params.data, params.data_base64) {
        (Some(text), None) => text.into_bytes(),
        (None, Some(encoded)) => STANDARD
            .decode(encoded.trim())
            .map_err(|e| ToolError::InvalidInput(format!("data_base64 is not valid base64: {e}")))?,
        _ => return Err(ToolError::InvalidInput("exactly one of data or data_base64 must be given".into()).into()),
    };

    let shown = hook.on_push(&data).map(NotificationView::from);
    let pending = host.pending().into_iter().map(NotificationView::from).collect();
    json_result(&PushNotifyOutput { shown, pending })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// Tag of the pending notification that was clicked.
    #[serde(default)]
    pub tag: Option<String>,

    /// Target URL for an untagged notification.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickOutput {
    pub navigated_to: String,
}

pub fn click_impl(
    hook: &NotificationHook, host: &Arc<PendingNotifications>, params: NotificationClickParams,
) -> Result<CallToolResult, McpError> {
    let request = match params.tag {
        Some(tag) => host
            .take(&tag)
            .ok_or_else(|| ToolError::InvalidInput(format!("no pending notification tagged {tag}")))?,
        None => host.take_untagged(params.url.as_deref()).unwrap_or(DisplayRequest {
            title: String::new(),
            body: String::new(),
            tag: None,
            require_interaction: false,
            url: params.url,
        }),
    };

    json_result(&NotificationClickOutput { navigated_to: hook.on_click(&request) })
}
