//! Push payload handling and notification clicks.
//!
//! The hook is stateless: it validates what arrives and forwards it to a
//! [`NotificationHost`], which owns display and navigation.

use std::sync::Arc;

use edgecache_core::Error;
use serde::{Deserialize, Serialize};

/// Wire shape of an incoming push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub require_interaction: bool,
    #[serde(default)]
    pub url: Option<String>,
}

/// A notification ready to be shown by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRequest {
    pub title: String,
    pub body: String,
    /// Notifications sharing a tag replace one another.
    pub tag: Option<String>,
    pub require_interaction: bool,
    /// Where a click should take the user; the app root when absent.
    pub url: Option<String>,
}

impl PushPayload {
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(data).map_err(|e| Error::InvalidPayload(e.to_string()))
    }
}

impl From<PushPayload> for DisplayRequest {
    fn from(p: PushPayload) -> Self {
        Self { title: p.title, body: p.body, tag: p.tag, require_interaction: p.require_interaction, url: p.url }
    }
}

/// Display surface the hook forwards to.
pub trait NotificationHost: Send + Sync {
    /// Show a notification, replacing any pending one with the same tag.
    fn show(&self, request: &DisplayRequest);

    /// Focus or open the app at `url`.
    fn navigate(&self, url: &str);
}

#[derive(Clone)]
pub struct NotificationHook {
    host: Arc<dyn NotificationHost>,
    app_root: String,
}

impl NotificationHook {
    pub fn new(host: Arc<dyn NotificationHost>, app_root: impl Into<String>) -> Self {
        Self { host, app_root: app_root.into() }
    }

    /// Parse a push payload and show it. Malformed payloads are logged and
    /// dropped.
    pub fn on_push(&self, data: &[u8]) -> Option<DisplayRequest> {
        let payload = match PushPayload::parse(data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, bytes = data.len(), "ignoring malformed push payload");
                return None;
            }
        };

        let request = DisplayRequest::from(payload);
        tracing::debug!(title = %request.title, tag = ?request.tag, "showing notification");
        self.host.show(&request);
        Some(request)
    }

    /// Navigate to the notification's target, or the app root. Returns the
    /// URL navigated to.
    pub fn on_click(&self, request: &DisplayRequest) -> String {
        let target = request.url.clone().unwrap_or_else(|| self.app_root.clone());
        tracing::debug!(url = %target, "notification clicked");
        self.host.navigate(&target);
        target
    }
}

impl std::fmt::Debug for NotificationHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHook").field("app_root", &self.app_root).finish_non_exhaustive()
    }
}
