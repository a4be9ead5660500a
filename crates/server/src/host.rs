//! In-process notification host.
//!
//! MCP has no display surface, so notifications are kept as pending items the
//! client can list and click. A new notification replaces a pending one with
//! the same tag. Untagged notifications and the navigation log are bounded;
//! the oldest item is dropped once a limit is reached.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use edgecache_client::{DisplayRequest, NotificationHost};

const MAX_UNTAGGED: usize = 64;
const MAX_NAVIGATIONS: usize = 64;

#[derive(Debug, Default)]
pub struct PendingNotifications {
    tagged: Mutex<BTreeMap<String, DisplayRequest>>,
    untagged: Mutex<VecDeque<DisplayRequest>>,
    navigations: Mutex<VecDeque<String>>,
}

impl PendingNotifications {
    /// Everything still pending, tagged first (by tag), then untagged in arrival order.
    pub fn pending(&self) -> Vec<DisplayRequest> {
        let mut out: Vec<_> = lock(&self.tagged).values().cloned().collect();
        out.extend(lock(&self.untagged).iter().cloned());
        out
    }

    /// Remove and return the pending notification with `tag`.
    pub fn take(&self, tag: &str) -> Option<DisplayRequest> {
        lock(&self.tagged).remove(tag)
    }

    /// Remove and return the oldest untagged notification pointing at `url`.
    pub fn take_untagged(&self, url: Option<&str>) -> Option<DisplayRequest> {
        let mut untagged = lock(&self.untagged);
        let index = untagged.iter().position(|r| r.url.as_deref() == url)?;
        untagged.remove(index)
    }

    /// Most recent navigations, oldest first.
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.navigations).iter().cloned().collect()
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, limit: usize) -> bool {
    let dropped = queue.len() >= limit;
    if dropped {
        queue.pop_front();
    }
    queue.push_back(item);
    dropped
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NotificationHost for PendingNotifications {
    fn show(&self, request: &DisplayRequest) {
        match &request.tag {
            Some(tag) => {
                if lock(&self.tagged).insert(tag.clone(), request.clone()).is_some() {
                    tracing::debug!(tag = %tag, "replaced pending notification");
                }
            }
            None => {
                if push_bounded(&mut lock(&self.untagged), request.clone(), MAX_UNTAGGED) {
                    tracing::debug!(limit = MAX_UNTAGGED, "dropped oldest untagged notification");
                }
            }
        }
    }

    fn navigate(&self, url: &str) {
        tracing::info!(url, "navigation requested");
        push_bounded(&mut lock(&self.navigations), url.to_string(), MAX_NAVIGATIONS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tag: Option<&str>, title: &str) -> DisplayRequest {
        DisplayRequest {
            title: title.into(),
            body: String::new(),
            tag: tag.map(String::from),
            require_interaction: false,
            url: None,
        }
    }

    fn linked(title: &str, url: &str) -> DisplayRequest {
        DisplayRequest { url: Some(url.into()), ..request(None, title) }
    }

    #[test]
    fn test_same_tag_replaces() {
        let host = PendingNotifications::default();
        host.show(&request(Some("inbox"), "one"));
        host.show(&request(Some("inbox"), "two"));
        host.show(&request(None, "loose"));

        let titles: Vec<_> = host.pending().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["two", "loose"]);
        assert_eq!(host.take("inbox").map(|r| r.title).as_deref(), Some("two"));
        assert!(host.take("inbox").is_none());
    }

    #[test]
    fn test_take_untagged_matches_url() {
        let host = PendingNotifications::default();
        host.show(&linked("a", "/a"));
        host.show(&linked("b", "/b"));
        host.show(&request(None, "plain"));

        assert_eq!(host.take_untagged(Some("/b")).map(|r| r.title).as_deref(), Some("b"));
        assert!(host.take_untagged(Some("/b")).is_none());
        assert_eq!(host.take_untagged(None).map(|r| r.title).as_deref(), Some("plain"));

        let titles: Vec<_> = host.pending().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["a"]);
    }

    #[test]
    fn test_untagged_and_navigations_are_bounded() {
        let host = PendingNotifications::default();
        for i in 0..MAX_UNTAGGED + 3 {
            host.show(&request(None, &format!("n{i}")));
            host.navigate(&format!("/page/{i}"));
        }

        let pending = host.pending();
        assert_eq!(pending.len(), MAX_UNTAGGED);
        assert_eq!(pending[0].title, "n3");

        let navigations = host.navigations();
        assert_eq!(navigations.len(), MAX_NAVIGATIONS);
        assert_eq!(navigations.last().map(String::as_str), Some(format!("/page/{}", MAX_UNTAGGED + 2).as_str()));
    }
}
