//! MCP server handler implementation.
//!
//! Routes tool calls to the proxy, the cache store, the event buffer, and
//! the notification hook.

use std::sync::Arc;

use edgecache_client::{EventQueue, ExpirySweep, NotificationHook, ProxyState, SyncTrigger};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::host::PendingNotifications;
use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, namespaces_impl, purge_impl};
use crate::tools::events::{enqueue_impl, sync_trigger_impl};
use crate::tools::notify::{click_impl, push_impl};
use crate::tools::proxy_fetch::proxy_fetch_impl;
use crate::tools::{EventEnqueueParams, NotificationClickParams, ProxyFetchParams, PushNotifyParams, SyncTriggerParams};

/// Handles shared by every tool call.
#[derive(Clone)]
pub struct Services {
    pub state: ProxyState,
    pub sweep: ExpirySweep,
    pub events: EventQueue,
    pub sync: SyncTrigger,
    pub hook: NotificationHook,
    pub notifications: Arc<PendingNotifications>,
}

/// The edgecache MCP server handler.
#[derive(Clone)]
pub struct EdgecacheServer {
    tool_router: ToolRouter<Self>,
    services: Services,
}

#[tool_router]
impl EdgecacheServer {
    pub fn new(services: Services) -> Self {
        Self { tool_router: Self::tool_router(), services }
    }

    #[tool(
        description = "Fetch a URL through the caching proxy. The request is classified (cache-first, network-first, cache-only, network-only, stale-while-revalidate) and answered from cache or origin accordingly."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        proxy_fetch_impl(&self.services.state, params.0).await
    }

    #[tool(description = "List cache namespaces with entry counts, marking those of the running version.")]
    async fn cache_namespaces(&self) -> Result<CallToolResult, McpError> {
        namespaces_impl(&self.services.state).await
    }

    #[tool(description = "Read the cached entry for a URL without contacting origin.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.services.state, params.0).await
    }

    #[tool(description = "Purge a cached URL, a whole namespace, or expired dynamic entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.services.state, &self.services.sweep, params.0).await
    }

    #[tool(description = "Buffer an outbound event for delivery on the next sync.")]
    async fn event_enqueue(&self, params: Parameters<EventEnqueueParams>) -> Result<CallToolResult, McpError> {
        enqueue_impl(&self.services.events, params.0).await
    }

    #[tool(description = "Wake the buffered-event sync for a tag without waiting for its interval.")]
    async fn sync_trigger(&self, params: Parameters<SyncTriggerParams>) -> Result<CallToolResult, McpError> {
        sync_trigger_impl(&self.services.sync, params.0)
    }

    #[tool(description = "Deliver a push payload ({title, body, tag?, requireInteraction?, url?}) and show it.")]
    async fn push_notify(&self, params: Parameters<PushNotifyParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.services.hook, &self.services.notifications, params.0)
    }

    #[tool(description = "Click a pending notification by tag, or an untagged one by URL, and navigate to its target.")]
    async fn notification_click(&self, params: Parameters<NotificationClickParams>) -> Result<CallToolResult, McpError> {
        click_impl(&self.services.hook, &self.services.notifications, params.0)
    }
}

impl ServerHandler for EdgecacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "edgecache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
